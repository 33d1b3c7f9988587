//! Initials avatar used whenever no usable photo is available.

use base64::Engine;
use serde::Serialize;
use sha2::{Digest, Sha256};

const PALETTE: &[&str] = &[
    "#1E88E5", "#43A047", "#F4511E", "#8E24AA", "#00897B", "#3949AB", "#C0CA33", "#6D4C41",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Placeholder {
    pub initials: String,
    pub background: String,
}

impl Placeholder {
    pub fn for_name(name: &str) -> Self {
        Self {
            initials: initials(name),
            background: background_for(name).to_string(),
        }
    }

    pub fn svg(&self) -> String {
        format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"128\" height=\"128\" viewBox=\"0 0 128 128\">\
             <rect width=\"128\" height=\"128\" fill=\"{}\"/>\
             <text x=\"50%\" y=\"50%\" dy=\".35em\" text-anchor=\"middle\" font-family=\"sans-serif\" \
             font-size=\"52\" fill=\"#FFFFFF\">{}</text></svg>",
            self.background, self.initials
        )
    }

    pub fn data_uri(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(self.svg());
        format!("data:image/svg+xml;base64,{}", encoded)
    }
}

/// Up to two initials from the first two words; `?` when there are none.
fn initials(name: &str) -> String {
    let letters: String = name
        .split_whitespace()
        .filter_map(|word| word.chars().find(|c| c.is_alphanumeric()))
        .take(2)
        .flat_map(char::to_uppercase)
        .collect();
    if letters.is_empty() {
        "?".to_string()
    } else {
        letters
    }
}

fn background_for(name: &str) -> &'static str {
    let hash = Sha256::digest(name.trim().to_lowercase().as_bytes());
    PALETTE[hash[0] as usize % PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initials() {
        assert_eq!(initials("asha rao"), "AR");
        assert_eq!(initials("Karthik"), "K");
        assert_eq!(initials("S. Priya Devi"), "SP");
        assert_eq!(initials("   "), "?");
    }

    #[test]
    fn test_background_is_stable_per_name() {
        let a = Placeholder::for_name("Asha Rao");
        let b = Placeholder::for_name("  asha rao ");
        assert_eq!(a.background, b.background);
        assert!(PALETTE.contains(&a.background.as_str()));
    }

    #[test]
    fn test_data_uri_is_svg() {
        let uri = Placeholder::for_name("Asha Rao").data_uri();
        assert!(uri.starts_with("data:image/svg+xml;base64,"));
    }
}
