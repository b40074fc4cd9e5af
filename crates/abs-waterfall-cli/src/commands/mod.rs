pub mod amortize;
pub mod pool;
pub mod price;
pub mod waterfall;

use abs_waterfall_core::waterfall::PaymentMode;

/// Payment-mode override shared by the deal commands.
#[derive(clap::Args, Debug, Clone, Default)]
#[group(multiple = false)]
pub struct ModeOverride {
    /// Pay principal strictly by seniority
    #[arg(long)]
    pub sequential: bool,
    /// Pay principal in proportion to notional
    #[arg(long)]
    pub pro_rata: bool,
}

impl ModeOverride {
    pub fn resolve(&self) -> Option<PaymentMode> {
        if self.sequential {
            Some(PaymentMode::Sequential)
        } else if self.pro_rata {
            Some(PaymentMode::ProRata)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_override() {
        assert_eq!(ModeOverride::default().resolve(), None);
        let seq = ModeOverride {
            sequential: true,
            pro_rata: false,
        };
        assert_eq!(seq.resolve(), Some(PaymentMode::Sequential));
    }
}
