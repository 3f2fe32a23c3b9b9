use {
    derive_more::{Display, From},
    serde::{Deserialize, Serialize},
    std::{borrow::Borrow, str::FromStr},
};

/// Stable identifier of an advertising slot on the page.
#[derive(
    Debug,
    Default,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Display,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct SlotId(pub String);

impl SlotId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SlotId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Borrow<str> for SlotId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A creative size in pixels, written as `<width>x<height>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[display("{width}x{height}")]
#[serde(try_from = "String", into = "String")]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid size {0:?}, expected <width>x<height>")]
pub struct InvalidSize(String);

impl FromStr for Size {
    type Err = InvalidSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSize(s.to_owned());
        let (width, height) = s.split_once(['x', 'X']).ok_or_else(invalid)?;
        Ok(Self {
            width: width.trim().parse().map_err(|_| invalid())?,
            height: height.trim().parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for Size {
    type Error = InvalidSize;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Size> for String {
    fn from(value: Size) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!("300x250".parse::<Size>().unwrap(), Size::new(300, 250));
        assert_eq!("728X90".parse::<Size>().unwrap(), Size::new(728, 90));
        assert!("300".parse::<Size>().is_err());
        assert!("axb".parse::<Size>().is_err());
        assert!("-1x250".parse::<Size>().is_err());
    }

    #[test]
    fn serializes_sizes_as_strings() {
        let sizes: Vec<Size> = serde_json::from_str(r#"["300x250","320x50"]"#).unwrap();
        assert_eq!(sizes, vec![Size::new(300, 250), Size::new(320, 50)]);
        assert_eq!(
            serde_json::to_string(&sizes).unwrap(),
            r#"["300x250","320x50"]"#
        );
    }
}
