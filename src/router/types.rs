//! Router result types.

use serde::{Deserialize, Serialize};

/// Query classification against the prior library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    /// Matches an existing thesis: load it, challenge or update it
    Fit,
    /// Relates to a known framework: load the pattern, test the fit
    Adjacent,
    /// Fresh territory: minimize priors, maximize reasoning space
    NetNew,
}

impl std::fmt::Display for RouteType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fit => write!(f, "FIT"),
            Self::Adjacent => write!(f, "ADJACENT"),
            Self::NetNew => write!(f, "NET_NEW"),
        }
    }
}

/// Token budget split across context categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBudget {
    pub thesis_tokens: usize,
    pub pattern_tokens: usize,
    pub data_tokens: usize,
    pub reasoning_tokens: usize,
}

impl ContextBudget {
    /// Allocation shares per route type: (thesis, pattern, data, reasoning).
    fn shares(route: RouteType) -> (f64, f64, f64, f64) {
        match route {
            RouteType::Fit => (0.40, 0.00, 0.30, 0.30),
            RouteType::Adjacent => (0.00, 0.30, 0.40, 0.30),
            RouteType::NetNew => (0.10, 0.00, 0.30, 0.60),
        }
    }

    /// Split a total token budget for a route type.
    pub fn allocate(route: RouteType, total: usize) -> Self {
        let (thesis, pattern, data, reasoning) = Self::shares(route);
        let of = |share: f64| (total as f64 * share) as usize;
        Self {
            thesis_tokens: of(thesis),
            pattern_tokens: of(pattern),
            data_tokens: of(data),
            reasoning_tokens: of(reasoning),
        }
    }

    pub fn total(&self) -> usize {
        self.thesis_tokens + self.pattern_tokens + self.data_tokens + self.reasoning_tokens
    }
}

/// Result of Pass 0 routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouterResult {
    pub route_type: RouteType,
    /// Confidence in the routing decision itself
    pub confidence: f64,
    /// Ids of matched prior theses
    pub matched_priors: Vec<String>,
    /// Ids of matched analytical frameworks
    pub matched_patterns: Vec<String>,
    pub budget: ContextBudget,
    /// Explanation of the routing decision
    pub reasoning: String,
    /// Prior-context block injected verbatim into the first expansion prompt
    pub assembled_context: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_allocations() {
        let fit = ContextBudget::allocate(RouteType::Fit, 8000);
        assert_eq!(fit.thesis_tokens, 3200);
        assert_eq!(fit.pattern_tokens, 0);
        assert_eq!(fit.data_tokens, 2400);
        assert_eq!(fit.reasoning_tokens, 2400);

        let adjacent = ContextBudget::allocate(RouteType::Adjacent, 8000);
        assert_eq!(adjacent.thesis_tokens, 0);
        assert_eq!(adjacent.pattern_tokens, 2400);
        assert_eq!(adjacent.data_tokens, 3200);

        let net_new = ContextBudget::allocate(RouteType::NetNew, 8000);
        assert_eq!(net_new.thesis_tokens, 800);
        assert_eq!(net_new.reasoning_tokens, 4800);
    }

    #[test]
    fn test_route_display() {
        assert_eq!(RouteType::NetNew.to_string(), "NET_NEW");
        assert_eq!(RouteType::Fit.to_string(), "FIT");
    }
}
