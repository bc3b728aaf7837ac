use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};

use serde::{Serialize, Serializer};

use crate::error::{Error, Result};

/// The numeric key that positions a record inside a container.
///
/// Integers and floats share one total order. A float holding an integral
/// value inside the `i64` range is stored as an integer, so `3` and `3.0`
/// are the same key and hash the same. NaN is not a key.
#[derive(Clone, Copy)]
pub struct Order(Repr);

#[derive(Clone, Copy, Debug)]
enum Repr {
    Int(i64),
    // never NaN, never integral within i64 range
    Float(f64),
}

// 2^63, the first float above i64::MAX
const I64_BOUND: f64 = 9_223_372_036_854_775_808.0;

impl Order {
    pub const fn int(value: i64) -> Self {
        Order(Repr::Int(value))
    }

    pub fn float(value: f64) -> Result<Self> {
        if value.is_nan() {
            return Err(Error::InvalidOrder);
        }
        if value.fract() == 0.0 && (-I64_BOUND..I64_BOUND).contains(&value) {
            return Ok(Order(Repr::Int(value as i64)));
        }
        Ok(Order(Repr::Float(value)))
    }

    pub fn as_int(self) -> Option<i64> {
        match self.0 {
            Repr::Int(i) => Some(i),
            Repr::Float(_) => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self.0 {
            Repr::Int(i) => i as f64,
            Repr::Float(f) => f,
        }
    }
}

fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f >= I64_BOUND {
        return Ordering::Less;
    }
    if f < -I64_BOUND {
        return Ordering::Greater;
    }
    // f is in range and has a fractional part, so it can't equal i
    let floor = f.floor() as i64;
    if i <= floor {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

impl Ord for Order {
    fn cmp(&self, other: &Self) -> Ordering {
        use Repr::*;
        match (self.0, other.0) {
            (Int(a), Int(b)) => a.cmp(&b),
            (Float(a), Float(b)) => a.total_cmp(&b),
            (Int(a), Float(b)) => cmp_int_float(a, b),
            (Float(a), Int(b)) => cmp_int_float(b, a).reverse(),
        }
    }
}

impl PartialOrd for Order {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Order {}

impl Hash for Order {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.0 {
            Repr::Int(i) => {
                0u8.hash(state);
                i.hash(state)
            }
            Repr::Float(f) => {
                1u8.hash(state);
                f.to_bits().hash(state)
            }
        }
    }
}

impl fmt::Debug for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Repr::Int(i) => write!(f, "{i}"),
            Repr::Float(x) => write!(f, "{x}"),
        }
    }
}

impl Serialize for Order {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Repr::Int(i) => serializer.serialize_i64(i),
            Repr::Float(f) => serializer.serialize_f64(f),
        }
    }
}

macro_rules! order_from_int {
    ($($int:ty),*) => {
        $(
            impl From<$int> for Order {
                fn from(value: $int) -> Self {
                    Order::int(value.into())
                }
            }
        )*
    };
}

order_from_int!(i8, i16, i32, i64, u8, u16, u32);

macro_rules! order_try_from_int {
    ($($int:ty),*) => {
        $(
            impl TryFrom<$int> for Order {
                type Error = Error;

                fn try_from(value: $int) -> Result<Self> {
                    i64::try_from(value)
                        .map(Order::int)
                        .map_err(|_| Error::IntegerOutOfRange(value as i128))
                }
            }
        )*
    };
}

order_try_from_int!(u64, usize, isize);

impl TryFrom<f64> for Order {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Order::float(value)
    }
}

impl TryFrom<f32> for Order {
    type Error = Error;

    fn try_from(value: f32) -> Result<Self> {
        Order::float(value.into())
    }
}

#[cfg(test)]
mod test {
    use std::{
        collections::hash_map::DefaultHasher,
        hash::{Hash, Hasher},
    };

    use super::Order;
    use crate::error::Error;

    fn hash_of(order: Order) -> u64 {
        let mut hasher = DefaultHasher::new();
        order.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn integral_floats_are_ints() {
        let three = Order::try_from(3.0).unwrap();
        assert_eq!(three, Order::from(3));
        assert_eq!(three.as_int(), Some(3));
        assert_eq!(hash_of(three), hash_of(Order::from(3)));

        let zero = Order::try_from(-0.0).unwrap();
        assert_eq!(zero, Order::from(0));
        assert_eq!(hash_of(zero), hash_of(Order::from(0)));

        assert_eq!(Order::try_from(2.5).unwrap().as_int(), None);
    }

    #[test]
    fn wide_integers_must_fit() {
        assert_eq!(Order::try_from(7usize), Ok(Order::from(7)));
        assert_eq!(Order::try_from(-7isize), Ok(Order::from(-7)));
        assert_eq!(Order::try_from(i64::MAX as u64), Ok(Order::from(i64::MAX)));
        assert_eq!(
            Order::try_from(u64::MAX),
            Err(Error::IntegerOutOfRange(u64::MAX as i128))
        );
        assert_eq!(
            Order::try_from(1u64 << 63),
            Err(Error::IntegerOutOfRange(1 << 63))
        );
    }

    #[test]
    fn nan_is_rejected() {
        assert_eq!(Order::try_from(f64::NAN), Err(Error::InvalidOrder));
        assert_eq!(Order::try_from(f32::NAN), Err(Error::InvalidOrder));
    }

    #[test]
    fn mixed_ordering() {
        let f = |x: f64| Order::try_from(x).unwrap();
        let i = Order::from;

        assert!(i(2) < f(2.5));
        assert!(f(2.5) < i(3));
        assert!(f(-2.5) < i(-2));
        assert!(i(-3) < f(-2.5));
        assert!(i(i64::MAX) < f(9_223_372_036_854_775_808.0));
        assert!(f(f64::NEG_INFINITY) < i(i64::MIN));
        assert!(i(i64::MAX) < f(f64::INFINITY));
        assert!(f(0.1) < f(0.2));

        let mut orders = vec![f(1.5), i(1), f(-0.5), i(-7), f(1e300)];
        orders.sort();
        assert_eq!(orders, vec![i(-7), f(-0.5), i(1), f(1.5), f(1e300)]);
    }

    #[test]
    fn display() {
        assert_eq!(Order::from(42).to_string(), "42");
        assert_eq!(Order::try_from(0.25).unwrap().to_string(), "0.25");
        assert_eq!(format!("{:?}", Order::from(-1)), "-1");
    }
}
