//! # tradegraph-dataflows — external data feeds
//!
//! Tool adapters behind the uniform [`Tool`](tradegraph_agents::tools::Tool)
//! interface: market data, news search with a wire fallback, three social
//! sentiment sources, and fundamentals. Every adapter returns a structured
//! empty envelope when a source has no data; nothing here fabricates
//! content.

pub mod envelope;
pub mod fundamentals;
pub mod http;
pub mod market;
pub mod news;
pub mod social;

use std::sync::Arc;
use tradegraph_agents::tools::ToolRegistry;

/// Register the full standard feed set.
pub fn standard_feed_registry(news_max_articles: usize) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(market::PriceHistoryTool));
    registry.register(Arc::new(market::TechnicalIndicatorsTool));
    registry.register(Arc::new(market::InsiderTransactionsTool));
    registry.register(Arc::new(market::CompanyProfileTool));

    registry.register(Arc::new(news::NewsSearchTool::new(news_max_articles)));
    registry.register(Arc::new(news::CompanyNewsWireTool));
    registry.register(Arc::new(news::GeneralNewsContextTool));

    registry.register(Arc::new(social::RedditSentimentTool));
    registry.register(Arc::new(social::StocktwitsSentimentTool));
    registry.register(Arc::new(social::TwitterSentimentTool));

    registry.register(Arc::new(fundamentals::FinancialStatementsTool));
    registry.register(Arc::new(fundamentals::EarningsNewsTool));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradegraph_agents::tools::{standard_toolkits, AnalystKind};

    #[test]
    fn test_standard_registry_covers_all_toolkits() {
        let registry = standard_feed_registry(15);
        let toolkits = standard_toolkits();
        for kind in AnalystKind::all() {
            for tool in toolkits.allowed(kind) {
                assert!(registry.contains(tool), "missing tool {tool} for {kind}");
            }
        }
    }
}
