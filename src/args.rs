use crate::error::ArgError;

use std::fmt;

/// A single dynamically typed argument handed to a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
  Unit,
  Bool(bool),
  Int(i64),
  UInt(u64),
  Float(f64),
  Str(String),
  Bytes(Vec<u8>),
}

impl Arg {
  /// Short name of the variant, used in `ArgError::TypeMismatch`.
  pub fn kind(&self) -> &'static str {
    match self {
      Arg::Unit => "unit",
      Arg::Bool(_) => "bool",
      Arg::Int(_) => "int",
      Arg::UInt(_) => "uint",
      Arg::Float(_) => "float",
      Arg::Str(_) => "str",
      Arg::Bytes(_) => "bytes",
    }
  }
}

impl fmt::Display for Arg {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Arg::Unit => write!(f, "()"),
      Arg::Bool(v) => write!(f, "{}", v),
      Arg::Int(v) => write!(f, "{}", v),
      Arg::UInt(v) => write!(f, "{}", v),
      Arg::Float(v) => write!(f, "{}", v),
      Arg::Str(v) => write!(f, "{}", v),
      Arg::Bytes(v) => write!(f, "{:?}", v),
    }
  }
}

impl From<()> for Arg {
  fn from(_: ()) -> Self {
    Arg::Unit
  }
}

impl From<bool> for Arg {
  fn from(v: bool) -> Self {
    Arg::Bool(v)
  }
}

impl From<i32> for Arg {
  fn from(v: i32) -> Self {
    Arg::Int(v.into())
  }
}

impl From<i64> for Arg {
  fn from(v: i64) -> Self {
    Arg::Int(v)
  }
}

impl From<u32> for Arg {
  fn from(v: u32) -> Self {
    Arg::UInt(v.into())
  }
}

impl From<u64> for Arg {
  fn from(v: u64) -> Self {
    Arg::UInt(v)
  }
}

impl From<usize> for Arg {
  fn from(v: usize) -> Self {
    Arg::UInt(v as u64)
  }
}

impl From<f64> for Arg {
  fn from(v: f64) -> Self {
    Arg::Float(v)
  }
}

impl From<&str> for Arg {
  fn from(v: &str) -> Self {
    Arg::Str(v.to_string())
  }
}

impl From<String> for Arg {
  fn from(v: String) -> Self {
    Arg::Str(v)
  }
}

impl From<Vec<u8>> for Arg {
  fn from(v: Vec<u8>) -> Self {
    Arg::Bytes(v)
  }
}

/// An ordered argument list for workers that take dynamically typed input.
///
/// Workers recover concrete values through the typed accessors, which return
/// `ArgError` instead of panicking when an argument is missing or has another
/// variant than expected.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Arg>);

impl Args {
  pub fn new() -> Self {
    Self(Vec::new())
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn push(&mut self, arg: impl Into<Arg>) {
    self.0.push(arg.into());
  }

  pub fn iter(&self) -> std::slice::Iter<'_, Arg> {
    self.0.iter()
  }

  /// Arguments from `index` onwards, e.g. the values following a format string.
  pub fn tail(&self, index: usize) -> &[Arg] {
    self.0.get(index..).unwrap_or(&[])
  }

  pub fn get(&self, index: usize) -> Result<&Arg, ArgError> {
    self.0.get(index).ok_or(ArgError::Missing {
      index,
      len: self.0.len(),
    })
  }

  pub fn bool(&self, index: usize) -> Result<bool, ArgError> {
    match self.get(index)? {
      Arg::Bool(v) => Ok(*v),
      other => Err(mismatch(index, "bool", other)),
    }
  }

  /// Signed integer at `index`. Unsigned values that fit are accepted too.
  pub fn int(&self, index: usize) -> Result<i64, ArgError> {
    match self.get(index)? {
      Arg::Int(v) => Ok(*v),
      Arg::UInt(v) if *v <= i64::MAX as u64 => Ok(*v as i64),
      other => Err(mismatch(index, "int", other)),
    }
  }

  /// Unsigned integer at `index`. Non-negative signed values are accepted too.
  pub fn uint(&self, index: usize) -> Result<u64, ArgError> {
    match self.get(index)? {
      Arg::UInt(v) => Ok(*v),
      Arg::Int(v) if *v >= 0 => Ok(*v as u64),
      other => Err(mismatch(index, "uint", other)),
    }
  }

  pub fn float(&self, index: usize) -> Result<f64, ArgError> {
    match self.get(index)? {
      Arg::Float(v) => Ok(*v),
      other => Err(mismatch(index, "float", other)),
    }
  }

  pub fn str(&self, index: usize) -> Result<&str, ArgError> {
    match self.get(index)? {
      Arg::Str(v) => Ok(v.as_str()),
      other => Err(mismatch(index, "str", other)),
    }
  }

  pub fn bytes(&self, index: usize) -> Result<&[u8], ArgError> {
    match self.get(index)? {
      Arg::Bytes(v) => Ok(v.as_slice()),
      other => Err(mismatch(index, "bytes", other)),
    }
  }
}

fn mismatch(index: usize, expected: &'static str, found: &Arg) -> ArgError {
  ArgError::TypeMismatch {
    index,
    expected,
    found: found.kind(),
  }
}

impl From<Vec<Arg>> for Args {
  fn from(v: Vec<Arg>) -> Self {
    Self(v)
  }
}

impl FromIterator<Arg> for Args {
  fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

impl IntoIterator for Args {
  type Item = Arg;
  type IntoIter = std::vec::IntoIter<Arg>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.into_iter()
  }
}

impl<'a> IntoIterator for &'a Args {
  type Item = &'a Arg;
  type IntoIter = std::slice::Iter<'a, Arg>;

  fn into_iter(self) -> Self::IntoIter {
    self.0.iter()
  }
}

/// Builds an `Args` list, converting every expression with `Arg::from`.
///
/// ```
/// use gather_pool::{args, Arg};
///
/// let a = args!["%s potato", "one", 3];
/// assert_eq!(a.len(), 3);
/// assert_eq!(a.get(2), Ok(&Arg::Int(3)));
/// ```
#[macro_export]
macro_rules! args {
  () => {
    $crate::Args::new()
  };
  ($($value:expr),+ $(,)?) => {
    $crate::Args::from(vec![$($crate::Arg::from($value)),+])
  };
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_macro_converts_each_value() {
    let a = args!["hello", 7, 3u64, 2.5, true, String::from("world")];
    assert_eq!(a.len(), 6);
    assert_eq!(a.str(0), Ok("hello"));
    assert_eq!(a.int(1), Ok(7));
    assert_eq!(a.uint(2), Ok(3));
    assert_eq!(a.float(3), Ok(2.5));
    assert_eq!(a.bool(4), Ok(true));
    assert_eq!(a.str(5), Ok("world"));
    assert!(args![].is_empty());
  }

  #[test]
  fn test_missing_argument() {
    let a = args![1];
    assert_eq!(a.int(1), Err(ArgError::Missing { index: 1, len: 1 }));
  }

  #[test]
  fn test_type_mismatch_names_both_kinds() {
    let a = args!["not a number"];
    assert_eq!(
      a.int(0),
      Err(ArgError::TypeMismatch {
        index: 0,
        expected: "int",
        found: "str"
      })
    );
  }

  #[test]
  fn test_signed_and_unsigned_cross_conversion() {
    let a = args![5u64, -1, u64::MAX];
    assert_eq!(a.int(0), Ok(5));
    assert!(a.uint(1).is_err());
    assert!(a.int(2).is_err());
  }

  #[test]
  fn test_tail_past_end_is_empty() {
    let a = args!["%v %v", "a", "b"];
    assert_eq!(a.tail(1).len(), 2);
    assert!(a.tail(5).is_empty());
  }
}
