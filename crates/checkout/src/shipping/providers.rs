use async_trait::async_trait;
use kilau_core::{Destination, Rupiah, ServiceOption};

use super::{RateError, RateProvider};

/// Row of the static rate table: courier, courier name, service, service
/// name, cost per started kilogram, ETD.
type StaticRate = (&'static str, &'static str, &'static str, &'static str, u64, &'static str);

const STATIC_RATES: &[StaticRate] = &[
    ("jne", "JNE", "REG", "Layanan Reguler", 9_000, "2-3 hari"),
    ("jne", "JNE", "YES", "Yakin Esok Sampai", 18_000, "1 hari"),
    ("pos", "POS Indonesia", "Pos Reguler", "Pos Reguler", 8_000, "3-5 hari"),
    ("tiki", "TIKI", "REG", "Regular Service", 9_500, "3 hari"),
    ("tiki", "TIKI", "ONS", "Over Night Service", 20_000, "1 hari"),
];

/// Fixed per-kilogram table used when live rates are unavailable.
///
/// Quotes ignore the destination; weight is rounded up to whole kilograms.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticRateProvider;

impl StaticRateProvider {
    /// Quote synchronously.
    #[must_use]
    pub fn quote(weight_grams: u32, courier: &str) -> Vec<ServiceOption> {
        let kilograms = u64::from(weight_grams.max(1).div_ceil(1000));
        let wanted: Vec<&str> = courier
            .split(':')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect();

        STATIC_RATES
            .iter()
            .filter(|(code, ..)| wanted.is_empty() || wanted.iter().any(|w| w.eq_ignore_ascii_case(code)))
            .map(|&(code, courier_name, service, service_name, per_kg, etd)| ServiceOption {
                courier: code.to_owned(),
                courier_name: courier_name.to_owned(),
                service: service.to_owned(),
                service_name: service_name.to_owned(),
                cost: Rupiah::new(per_kg.saturating_mul(kilograms)),
                etd: etd.to_owned(),
            })
            .collect()
    }
}

#[async_trait]
impl RateProvider for StaticRateProvider {
    async fn fetch_rates(
        &self,
        _destination: &Destination,
        weight_grams: u32,
        courier: &str,
    ) -> Result<Vec<ServiceOption>, RateError> {
        Ok(Self::quote(weight_grams, courier))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cost_rounds_up_per_kilogram() {
        let one = StaticRateProvider::quote(1, "jne");
        assert_eq!(one.len(), 2);
        assert_eq!(one[0].cost, Rupiah::new(9_000));

        let heavy = StaticRateProvider::quote(1_001, "jne");
        assert_eq!(heavy[0].cost, Rupiah::new(18_000));
    }

    #[test]
    fn test_courier_filter() {
        let quotes = StaticRateProvider::quote(500, "POS:tiki");
        assert!(quotes.iter().all(|q| q.courier != "jne"));
        assert_eq!(quotes.len(), 3);
        assert_eq!(StaticRateProvider::quote(500, "").len(), STATIC_RATES.len());
    }
}
