use crate::ws::NewTokenEvent;

/// Criteria a freshly created token must meet before the sniper buys it.
/// Unset bounds always pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnipeFilter {
    pub min_market_cap_sol: Option<f64>,
    pub max_market_cap_sol: Option<f64>,
    /// Minimum SOL the creator spent on the dev buy.
    pub min_initial_sol: Option<f64>,
    /// Case-insensitive substring of the name or symbol.
    pub name_contains: Option<String>,
}

impl SnipeFilter {
    pub fn accepts(&self, event: &NewTokenEvent) -> bool {
        if let Some(min) = self.min_market_cap_sol {
            if event.market_cap_sol.map_or(true, |mc| mc < min) {
                return false;
            }
        }
        if let Some(max) = self.max_market_cap_sol {
            if event.market_cap_sol.map_or(true, |mc| mc > max) {
                return false;
            }
        }
        if let Some(min) = self.min_initial_sol {
            if event.sol_amount.map_or(true, |sol| sol < min) {
                return false;
            }
        }
        if let Some(needle) = &self.name_contains {
            let needle = needle.to_lowercase();
            let hit = [&event.name, &event.symbol]
                .iter()
                .any(|field| field.as_deref().map_or(false, |s| s.to_lowercase().contains(&needle)));
            if !hit {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::{parse_event, PortalEvent};

    fn token(json: &str) -> NewTokenEvent {
        match parse_event(json) {
            Some(PortalEvent::NewToken(e)) => e,
            other => panic!("not a create frame: {:?}", other),
        }
    }

    #[test]
    fn default_filter_accepts_everything() {
        assert!(SnipeFilter::default().accepts(&token(r#"{"txType":"create","mint":"M"}"#)));
    }

    #[test]
    fn bounds_and_name_are_checked() {
        let filter = SnipeFilter {
            min_market_cap_sol: Some(20.0),
            max_market_cap_sol: Some(80.0),
            min_initial_sol: Some(0.5),
            name_contains: Some("cat".to_string()),
        };
        let good = token(r#"{"txType":"create","mint":"M","name":"Fat Cat","symbol":"FAT","marketCapSol":30,"solAmount":1}"#);
        assert!(filter.accepts(&good));

        let by_symbol = token(r#"{"txType":"create","mint":"M","name":"x","symbol":"CATZ","marketCapSol":30,"solAmount":1}"#);
        assert!(filter.accepts(&by_symbol));

        let too_big = token(r#"{"txType":"create","mint":"M","name":"cat","marketCapSol":90,"solAmount":1}"#);
        assert!(!filter.accepts(&too_big));

        let no_dev_buy = token(r#"{"txType":"create","mint":"M","name":"cat","marketCapSol":30}"#);
        assert!(!filter.accepts(&no_dev_buy));

        let wrong_name = token(r#"{"txType":"create","mint":"M","name":"dog","marketCapSol":30,"solAmount":1}"#);
        assert!(!filter.accepts(&wrong_name));
    }
}
