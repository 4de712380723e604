//! Synthetic check-in orders.
//!
//! Every order is derived from a monotonically increasing index: the location
//! code is `index mod 3` and the subtotal is `index + 0.32`. Only the order id
//! is random. Ids are drawn from a seeded generator so a run can be replayed
//! id-for-id by reusing its seed.

use std::{fmt, str::FromStr};

use rand::{Rng, SeedableRng, rngs::StdRng};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// The number of distinct location codes.
pub const LOCATION_COUNT: u8 = 3;

/// Fractional part added to every subtotal.
const SUBTOTAL_FRACTION: f64 = 0.32;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
/// Errors produced by [`Location`].
pub enum Error {
    /// The code is not one of the known location codes.
    #[error("Unknown location code: {0:?}")]
    UnknownLocation(String),
}

/// A store location code. Always one of `0`, `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location(u8);

impl Location {
    /// The location assigned to the order at `index`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_index(index: u64) -> Self {
        Self((index % u64::from(LOCATION_COUNT)) as u8)
    }

    /// The numeric location code.
    #[must_use]
    pub fn code(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        // Only the canonical single digit; "+1" and "01" parse as u8.
        match input.parse::<u8>() {
            Ok(code) if input.len() == 1 && code < LOCATION_COUNT => Ok(Self(code)),
            _ => Err(Error::UnknownLocation(input.to_string())),
        }
    }
}

/// A single synthetic check-in / purchase event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Order {
    /// Unique order identifier
    pub id: Uuid,
    /// Location the order was placed at
    pub location: Location,
    /// Time the order was created
    pub check_in: OffsetDateTime,
    /// Order subtotal
    pub subtotal: f64,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let check_in = self.check_in.format(&Rfc3339).map_err(|_| fmt::Error)?;
        write!(
            f,
            "order {id} location={location} check_in={check_in} subtotal={subtotal:.2}",
            id = self.id,
            location = self.location,
            subtotal = self.subtotal,
        )
    }
}

/// The subtotal of the order at `index`.
#[must_use]
pub fn subtotal(index: u64) -> f64 {
    index as f64 + SUBTOTAL_FRACTION
}

/// Draw a fresh generator seed from the thread RNG.
#[must_use]
pub fn random_seed() -> [u8; 32] {
    rand::rng().random()
}

/// Produces [`Order`] instances in index order.
#[derive(Debug)]
pub struct Generator {
    rng: StdRng,
    index: u64,
}

impl Generator {
    /// Create a new [`Generator`] starting at index 0.
    #[must_use]
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            rng: StdRng::from_seed(seed),
            index: 0,
        }
    }

    /// The index of the next order this generator will produce.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Produce the order for the current index, stamped with `check_in`, and
    /// advance the index.
    pub fn next_order(&mut self, check_in: OffsetDateTime) -> Order {
        let index = self.index;
        self.index += 1;

        let id = uuid::Builder::from_random_bytes(self.rng.random()).into_uuid();
        Order {
            id,
            location: Location::from_index(index),
            check_in,
            subtotal: subtotal(index),
        }
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use time::OffsetDateTime;

    use super::{Generator, Location, subtotal};

    #[test]
    fn first_locations_cycle() {
        let mut generator = Generator::new([0; 32]);
        let now = OffsetDateTime::now_utc();
        let codes: Vec<String> = (0..4)
            .map(|_| generator.next_order(now).location.to_string())
            .collect();
        assert_eq!(codes, vec!["0", "1", "2", "0"]);
    }

    #[test]
    fn first_fifteen_subtotals() {
        let expected = [
            0.32, 1.32, 2.32, 3.32, 4.32, 5.32, 6.32, 7.32, 8.32, 9.32, 10.32, 11.32, 12.32, 13.32,
            14.32,
        ];
        let mut generator = Generator::new([7; 32]);
        let now = OffsetDateTime::now_utc();
        for (n, want) in expected.iter().enumerate() {
            let order = generator.next_order(now);
            assert!((order.subtotal - want).abs() < 1e-9);
            assert_eq!(format!("{:.6}", order.subtotal), format!("{n}.320000"));
        }
        assert_eq!(generator.index(), 15);
    }

    #[test]
    fn ids_are_distinct() {
        let mut generator = Generator::new([42; 32]);
        let now = OffsetDateTime::now_utc();
        let ids: HashSet<_> = (0..10_000).map(|_| generator.next_order(now).id).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn same_seed_same_ids() {
        let now = OffsetDateTime::now_utc();
        let mut a = Generator::new([3; 32]);
        let mut b = Generator::new([3; 32]);
        for _ in 0..32 {
            assert_eq!(a.next_order(now).id, b.next_order(now).id);
        }
    }

    #[test]
    fn ids_are_version_four() {
        let mut generator = Generator::new([9; 32]);
        let order = generator.next_order(OffsetDateTime::now_utc());
        assert_eq!(order.id.get_version_num(), 4);
    }

    #[test]
    fn location_parse_rejects_non_canonical() {
        assert!("3".parse::<Location>().is_err());
        assert!("01".parse::<Location>().is_err());
        assert!("+1".parse::<Location>().is_err());
        assert!("".parse::<Location>().is_err());
        assert_eq!("2".parse::<Location>(), Ok(Location::from_index(2)));
    }

    #[test]
    fn display_carries_fields() {
        let mut generator = Generator::new([1; 32]);
        let order = generator.next_order(OffsetDateTime::UNIX_EPOCH);
        let line = order.to_string();
        assert!(line.contains(&order.id.to_string()));
        assert!(line.contains("location=0"));
        assert!(line.contains("check_in=1970-01-01T00:00:00Z"));
        assert!(line.contains("subtotal=0.32"));
    }

    #[test]
    fn orders_are_copy() {
        let order = Generator::new([6; 32]).next_order(OffsetDateTime::UNIX_EPOCH);
        let copied = order;
        assert_eq!(copied, order);
    }

    // The location is always one of three codes and is determined entirely by
    // the index.
    proptest! {
        #[test]
        fn location_is_index_mod_three(index: u64) {
            let location = Location::from_index(index);
            prop_assert!(location.code() < 3);
            prop_assert_eq!(u64::from(location.code()), index % 3);
            prop_assert_eq!(location.to_string().parse::<Location>(), Ok(location));
        }
    }

    proptest! {
        #[test]
        fn subtotal_keeps_fraction(index in 0..1_000_000_u64) {
            prop_assert_eq!(format!("{:.6}", subtotal(index)), format!("{index}.320000"));
        }
    }
}
