use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Gender {
    #[default]
    Female,
    Male,
    Neutral,
}

impl Gender {
    pub const ALL: [Gender; 3] = [Gender::Female, Gender::Male, Gender::Neutral];

    pub fn label(self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
            Gender::Neutral => "Neutral",
        }
    }

    /// Subject noun used when phrasing generation prompts.
    pub fn subject(self) -> &'static str {
        match self {
            Gender::Female => "a woman",
            Gender::Male => "a man",
            Gender::Neutral => "a person",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Style {
    #[default]
    Casual,
    Professional,
    Elegant,
    Streetwear,
    Fitness,
    Editorial,
}

impl Style {
    pub const ALL: [Style; 6] = [
        Style::Casual,
        Style::Professional,
        Style::Elegant,
        Style::Streetwear,
        Style::Fitness,
        Style::Editorial,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Style::Casual => "Casual",
            Style::Professional => "Professional",
            Style::Elegant => "Elegant",
            Style::Streetwear => "Streetwear",
            Style::Fitness => "Fitness",
            Style::Editorial => "Editorial",
        }
    }

    pub fn mood(self) -> &'static str {
        match self {
            Style::Casual => "relaxed, candid and natural",
            Style::Professional => "confident, polished and approachable",
            Style::Elegant => "graceful, refined and poised",
            Style::Streetwear => "bold, urban and effortless",
            Style::Fitness => "strong, energetic and athletic",
            Style::Editorial => "dramatic, angular and fashion-forward",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "female" | "f" | "woman" => Ok(Gender::Female),
            "male" | "m" | "man" => Ok(Gender::Male),
            "neutral" | "n" | "nonbinary" | "non-binary" | "any" => Ok(Gender::Neutral),
            _ => Err(format!(
                "Unknown gender '{}'. Expected one of: {}.",
                raw.trim(),
                Gender::ALL.map(Gender::label).join(", ")
            )),
        }
    }
}

impl FromStr for Style {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        Style::ALL
            .into_iter()
            .find(|style| style.label().to_ascii_lowercase() == normalized)
            .or(match normalized.as_str() {
                "street" => Some(Style::Streetwear),
                "sport" | "sporty" | "gym" => Some(Style::Fitness),
                "fashion" => Some(Style::Editorial),
                "business" | "work" => Some(Style::Professional),
                _ => None,
            })
            .ok_or_else(|| {
                format!(
                    "Unknown style '{}'. Expected one of: {}.",
                    raw.trim(),
                    Style::ALL.map(Style::label).join(", ")
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::{Gender, Style};

    #[test]
    fn gender_parses_aliases_case_insensitively() {
        assert_eq!("FEMALE".parse::<Gender>(), Ok(Gender::Female));
        assert_eq!(" man ".parse::<Gender>(), Ok(Gender::Male));
        assert_eq!("non-binary".parse::<Gender>(), Ok(Gender::Neutral));
        let err = "robot".parse::<Gender>().err().unwrap_or_default();
        assert!(err.contains("Female, Male, Neutral"), "unexpected: {err}");
    }

    #[test]
    fn style_parses_labels_and_aliases() {
        assert_eq!("casual".parse::<Style>(), Ok(Style::Casual));
        assert_eq!("Street".parse::<Style>(), Ok(Style::Streetwear));
        assert_eq!("fashion".parse::<Style>(), Ok(Style::Editorial));
        assert!("baroque".parse::<Style>().is_err());
    }
}
