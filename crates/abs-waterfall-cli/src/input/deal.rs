use serde::{Deserialize, Serialize};

use abs_waterfall_core::monte_carlo::PricingConfig;
use abs_waterfall_core::waterfall::DealSpec;

use crate::input;

/// A deal file: the liability structure plus optional pricing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealFile {
    #[serde(flatten)]
    pub deal: DealSpec,
    #[serde(default)]
    pub pricing: PricingConfig,
}

/// Load a deal from `--deal`, then piped stdin, then fall back to the
/// default two-class structure.
pub fn load_deal(path: Option<&str>) -> Result<DealFile, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        input::file::read_structured(path)
    } else if let Some(data) = input::stdin::read_stdin()? {
        Ok(serde_json::from_value(data)?)
    } else {
        Ok(DealFile::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use abs_waterfall_core::monte_carlo::DefaultAssumption;
    use abs_waterfall_core::waterfall::PaymentMode;

    #[test]
    fn test_deal_file_with_pricing_block() {
        let raw = r#"{
            "deal_name": "Auto ABS 2020-1",
            "payment_mode": "pro_rata",
            "closing_date": "2020-12-01",
            "tranches": [
                { "name": "A", "notional_share": 0.8, "coupon_rate": 0.05, "subordination": 1, "damping": 1.2 },
                { "name": "B", "notional_share": 0.2, "coupon_rate": 0.08, "subordination": 2 }
            ],
            "pricing": { "num_trials": 8, "workers": 4, "seed": 42, "defaults": { "type": "None" } }
        }"#;
        let file: DealFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.deal.payment_mode, PaymentMode::ProRata);
        assert_eq!(file.deal.non_equity, 0.95);
        assert_eq!(file.deal.tranches[0].damping, Some(1.2));
        assert_eq!(file.pricing.num_trials, 8);
        assert_eq!(file.pricing.seed, Some(42));
        assert_eq!(file.pricing.tolerance, 0.005);
        assert_eq!(file.pricing.defaults, DefaultAssumption::NoDefaults);
    }

    #[test]
    fn test_pricing_block_is_optional() {
        let raw = r#"{ "tranches": [
            { "name": "A", "notional_share": 1.0, "coupon_rate": 0.05, "subordination": 1 }
        ] }"#;
        let file: DealFile = serde_json::from_str(raw).unwrap();
        assert_eq!(file.pricing, PricingConfig::default());
        assert!(file.deal.validate().is_ok());
    }
}
