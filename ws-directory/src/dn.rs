//! Distinguished name parsing (RFC 4514 string form).
//!
//! Group memberships come back from the directory as full DNs such as
//! `CN=HR-Admins,OU=Groups,DC=innovatech,DC=local`. Values may contain escaped
//! separators (`CN=Smith\, John`), hex escapes (`CN=R\26D`) or, in the older
//! RFC 1779 form, quoted strings, so the name is parsed rather than sliced.

use std::fmt;
use std::iter::Peekable;
use std::str::{CharIndices, FromStr};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnError {
    #[error("empty attribute type at offset {0}")]
    EmptyType(usize),

    #[error("expected '=' at offset {0}")]
    MissingEquals(usize),

    #[error("invalid escape sequence at offset {0}")]
    InvalidEscape(usize),

    #[error("invalid hex string at offset {0}")]
    InvalidHex(usize),

    #[error("unterminated quoted value starting at offset {0}")]
    UnterminatedQuote(usize),

    #[error("unexpected character '{ch}' at offset {offset}")]
    Unexpected { ch: char, offset: usize },

    #[error("attribute value is not valid UTF-8")]
    InvalidUtf8,
}

/// One `type=value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeValue {
    pub attr_type: String,
    pub value: String,
}

/// A relative distinguished name; usually a single pair, `+` joins several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rdn(Vec<AttributeValue>);

impl Rdn {
    pub fn attributes(&self) -> &[AttributeValue] {
        &self.0
    }

    /// Value for `attr_type` (compared case-insensitively).
    pub fn get(&self, attr_type: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|av| av.attr_type.eq_ignore_ascii_case(attr_type))
            .map(|av| av.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistinguishedName {
    rdns: Vec<Rdn>,
}

impl DistinguishedName {
    pub fn parse(input: &str) -> Result<Self, DnError> {
        Parser::new(input).parse()
    }

    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Value of the leading RDN when it carries `attr_type`.
    pub fn leading_value(&self, attr_type: &str) -> Option<&str> {
        self.rdns.first().and_then(|rdn| rdn.get(attr_type))
    }

    /// Short name of the entry, e.g. `HR-Admins` for a group DN.
    pub fn common_name(&self) -> Option<&str> {
        self.leading_value("CN")
    }

    pub fn domain_components(&self) -> impl Iterator<Item = &str> {
        self.rdns.iter().filter_map(|rdn| rdn.get("DC"))
    }

    /// DNS domain spelled by the `DC` components: `DC=corp,DC=local` -> `corp.local`.
    pub fn dns_domain(&self) -> Option<String> {
        let parts: Vec<&str> = self.domain_components().collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        }
    }
}

impl FromStr for DistinguishedName {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            for (j, av) in rdn.0.iter().enumerate() {
                if j > 0 {
                    f.write_str("+")?;
                }
                write!(f, "{}=", av.attr_type)?;
                write_escaped(f, &av.value)?;
            }
        }
        Ok(())
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    let last = value.chars().count().saturating_sub(1);
    for (i, ch) in value.chars().enumerate() {
        let needs_escape = matches!(ch, ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=')
            || (i == 0 && (ch == '#' || ch == ' '))
            || (i == last && ch == ' ');
        if needs_escape {
            f.write_str("\\")?;
        }
        write!(f, "{ch}")?;
    }
    Ok(())
}

struct Parser<'a> {
    input: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
        }
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.input.len(), |(i, _)| *i)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(' ') {
            self.chars.next();
        }
    }

    fn parse(mut self) -> Result<DistinguishedName, DnError> {
        let mut rdns = Vec::new();

        self.skip_spaces();
        if self.peek().is_none() {
            return Ok(DistinguishedName { rdns });
        }

        loop {
            rdns.push(self.parse_rdn()?);
            self.skip_spaces();
            match self.chars.next() {
                None => break,
                Some((_, ',')) | Some((_, ';')) => self.skip_spaces(),
                Some((offset, ch)) => return Err(DnError::Unexpected { ch, offset }),
            }
        }

        Ok(DistinguishedName { rdns })
    }

    fn parse_rdn(&mut self) -> Result<Rdn, DnError> {
        let mut pairs = vec![self.parse_pair()?];
        loop {
            self.skip_spaces();
            if self.peek() != Some('+') {
                break;
            }
            self.chars.next();
            pairs.push(self.parse_pair()?);
        }
        Ok(Rdn(pairs))
    }

    fn parse_pair(&mut self) -> Result<AttributeValue, DnError> {
        self.skip_spaces();
        let start = self.offset();
        let mut attr_type = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' {
                attr_type.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        if attr_type.is_empty() {
            return Err(DnError::EmptyType(start));
        }

        self.skip_spaces();
        let eq_offset = self.offset();
        if self.chars.next().map(|(_, c)| c) != Some('=') {
            return Err(DnError::MissingEquals(eq_offset));
        }
        self.skip_spaces();

        let value = match self.peek() {
            Some('#') => self.parse_hex_string()?,
            Some('"') => self.parse_quoted()?,
            _ => self.parse_string()?,
        };

        Ok(AttributeValue { attr_type, value })
    }

    fn parse_string(&mut self) -> Result<String, DnError> {
        let mut bytes = Vec::new();
        // Unescaped trailing spaces are not part of the value.
        let mut trailing_spaces = 0usize;

        while let Some(c) = self.peek() {
            match c {
                ',' | ';' | '+' => break,
                '\\' => {
                    let offset = self.offset();
                    self.chars.next();
                    self.parse_escape(offset, &mut bytes)?;
                    trailing_spaces = 0;
                }
                _ => {
                    self.chars.next();
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                    trailing_spaces = if c == ' ' { trailing_spaces + 1 } else { 0 };
                }
            }
        }

        bytes.truncate(bytes.len() - trailing_spaces);
        String::from_utf8(bytes).map_err(|_| DnError::InvalidUtf8)
    }

    fn parse_quoted(&mut self) -> Result<String, DnError> {
        let start = self.offset();
        self.chars.next();
        let mut bytes = Vec::new();

        loop {
            match self.chars.next() {
                None => return Err(DnError::UnterminatedQuote(start)),
                Some((_, '"')) => break,
                Some((offset, '\\')) => self.parse_escape(offset, &mut bytes)?,
                Some((_, c)) => {
                    let mut buf = [0u8; 4];
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }

        String::from_utf8(bytes).map_err(|_| DnError::InvalidUtf8)
    }

    /// `#` followed by hex pairs (BER encoding); kept verbatim.
    fn parse_hex_string(&mut self) -> Result<String, DnError> {
        let start = self.offset();
        let mut raw = String::new();
        while let Some(c) = self.peek() {
            if matches!(c, ',' | ';' | '+' | ' ') {
                break;
            }
            raw.push(c);
            self.chars.next();
        }

        let digits = &raw[1..];
        if digits.is_empty() || digits.len() % 2 != 0 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DnError::InvalidHex(start));
        }
        Ok(raw)
    }

    /// Handles the part after a backslash: a special character or a hex pair.
    fn parse_escape(&mut self, offset: usize, bytes: &mut Vec<u8>) -> Result<(), DnError> {
        match self.chars.next() {
            Some((_, c)) if c.is_ascii_hexdigit() => {
                let low = match self.chars.next() {
                    Some((_, l)) if l.is_ascii_hexdigit() => l,
                    _ => return Err(DnError::InvalidEscape(offset)),
                };
                let byte = hex_value(c) << 4 | hex_value(low);
                bytes.push(byte);
                Ok(())
            }
            Some((_, c)) if matches!(c, ' ' | '"' | '#' | '+' | ',' | ';' | '<' | '=' | '>' | '\\') => {
                bytes.push(c as u8);
                Ok(())
            }
            _ => Err(DnError::InvalidEscape(offset)),
        }
    }
}

fn hex_value(c: char) -> u8 {
    c.to_digit(16).map_or(0, |d| d as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_common_name() {
        let dn = DistinguishedName::parse("CN=HR-Admins,OU=Groups,DC=innovatech,DC=local").unwrap();
        assert_eq!(dn.common_name(), Some("HR-Admins"));
        assert_eq!(dn.rdns().len(), 4);
        assert_eq!(dn.dns_domain().as_deref(), Some("innovatech.local"));
    }

    #[test]
    fn test_escaped_comma_stays_in_value() {
        let dn = DistinguishedName::parse(r"CN=Smith\, John,OU=People,DC=corp,DC=example").unwrap();
        assert_eq!(dn.common_name(), Some("Smith, John"));
        assert_eq!(dn.rdns()[1].get("ou"), Some("People"));
    }

    #[test]
    fn test_equals_and_hex_escapes() {
        let dn = DistinguishedName::parse(r"CN=R\26D \3D Ops,DC=corp").unwrap();
        assert_eq!(dn.common_name(), Some("R&D = Ops"));

        let dn = DistinguishedName::parse(r"CN=Jos\C3\A9,DC=corp").unwrap();
        assert_eq!(dn.common_name(), Some("José"));
    }

    #[test]
    fn test_quoted_value() {
        let dn = DistinguishedName::parse(r#"CN="Doe, Jane",OU=People"#).unwrap();
        assert_eq!(dn.common_name(), Some("Doe, Jane"));
    }

    #[test]
    fn test_spaces_around_separators() {
        let dn = DistinguishedName::parse("cn = Engineering , ou=Groups ; dc=corp").unwrap();
        assert_eq!(dn.common_name(), Some("Engineering"));
        assert_eq!(dn.dns_domain().as_deref(), Some("corp"));
    }

    #[test]
    fn test_multi_valued_rdn() {
        let dn = DistinguishedName::parse("CN=Ops+OU=IT,DC=corp").unwrap();
        assert_eq!(dn.common_name(), Some("Ops"));
        assert_eq!(dn.rdns()[0].attributes().len(), 2);
    }

    #[test]
    fn test_leading_rdn_must_be_cn() {
        let dn = DistinguishedName::parse("OU=Groups,CN=Hidden,DC=corp").unwrap();
        assert_eq!(dn.common_name(), None);
    }

    #[test]
    fn test_hex_string_value() {
        let dn = DistinguishedName::parse("1.3.6.1.4.1.1466.0=#04024869,DC=corp").unwrap();
        assert_eq!(dn.leading_value("1.3.6.1.4.1.1466.0"), Some("#04024869"));
        assert!(DistinguishedName::parse("CN=#0G").is_err());
    }

    #[test]
    fn test_empty_dn() {
        assert!(DistinguishedName::parse("").unwrap().is_empty());
        assert!(DistinguishedName::parse("   ").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_names() {
        assert_eq!(DistinguishedName::parse("=value"), Err(DnError::EmptyType(0)));
        assert_eq!(DistinguishedName::parse("CN"), Err(DnError::MissingEquals(2)));
        assert_eq!(DistinguishedName::parse(r"CN=bad\q"), Err(DnError::InvalidEscape(6)));
        assert_eq!(DistinguishedName::parse(r#"CN="open"#), Err(DnError::UnterminatedQuote(3)));
        assert!(DistinguishedName::parse("CN=a,,DC=b").is_err());
    }

    #[test]
    fn test_display_round_trips_special_characters() {
        let original = r"CN=Smith\, John,OU=R&D,DC=corp";
        let dn = DistinguishedName::parse(original).unwrap();
        let reparsed = DistinguishedName::parse(&dn.to_string()).unwrap();
        assert_eq!(dn, reparsed);
    }
}
