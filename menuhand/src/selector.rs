use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder substituted by [`Selector::render`].
pub const PARAM_PLACEHOLDER: &str = "{name}";

/// Represents one way to locate an element on a portal page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by `data-testid` attribute
    TestId(String),
    /// Select by ARIA role and optional accessible name
    Role { role: String, name: Option<String> },
    /// Select form controls by their associated label text
    Label(String),
    /// Select inputs by placeholder attribute
    Placeholder(String),
    /// Select by visible text content
    Text(String),
    /// Select using a CSS selector (structural class names)
    Css(String),
    /// Select using an XPath expression (positional heuristics)
    XPath(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

/// How stable a kind of locator tends to be across UI releases. Higher is
/// more stable and should be tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityTier {
    Positional = 0,
    Structural = 1,
    Text = 2,
    Semantic = 3,
    TestId = 4,
}

impl Selector {
    pub fn tier(&self) -> StabilityTier {
        match self {
            Selector::TestId(_) => StabilityTier::TestId,
            Selector::Role { .. } | Selector::Label(_) | Selector::Placeholder(_) => {
                StabilityTier::Semantic
            }
            Selector::Text(_) => StabilityTier::Text,
            Selector::Css(_) => StabilityTier::Structural,
            Selector::XPath(_) | Selector::Invalid(_) => StabilityTier::Positional,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Selector::Invalid(_))
    }

    /// Whether this selector carries a `{name}` placeholder.
    pub fn is_template(&self) -> bool {
        self.fields().iter().any(|f| f.contains(PARAM_PLACEHOLDER))
    }

    /// Substitute the `{name}` placeholder. Non-template selectors are
    /// returned unchanged.
    pub fn render(&self, param: Option<&str>) -> Selector {
        let Some(value) = param else {
            return self.clone();
        };
        let sub = |s: &String| s.replace(PARAM_PLACEHOLDER, value);
        match self {
            Selector::TestId(s) => Selector::TestId(sub(s)),
            Selector::Role { role, name } => Selector::Role {
                role: sub(role),
                name: name.as_ref().map(sub),
            },
            Selector::Label(s) => Selector::Label(sub(s)),
            Selector::Placeholder(s) => Selector::Placeholder(sub(s)),
            Selector::Text(s) => Selector::Text(sub(s)),
            Selector::Css(s) => Selector::Css(sub(s)),
            Selector::XPath(s) => Selector::XPath(sub(s)),
            Selector::Invalid(s) => Selector::Invalid(s.clone()),
        }
    }

    fn fields(&self) -> Vec<&str> {
        match self {
            Selector::Role { role, name } => {
                let mut v = vec![role.as_str()];
                if let Some(n) = name {
                    v.push(n.as_str());
                }
                v
            }
            Selector::TestId(s)
            | Selector::Label(s)
            | Selector::Placeholder(s)
            | Selector::Text(s)
            | Selector::Css(s)
            | Selector::XPath(s)
            | Selector::Invalid(s) => vec![s.as_str()],
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::TestId(s) => write!(f, "testid:{s}"),
            Selector::Role { role, name: Some(n) } => write!(f, "role:{role}|{n}"),
            Selector::Role { role, name: None } => write!(f, "role:{role}"),
            Selector::Label(s) => write!(f, "label:{s}"),
            Selector::Placeholder(s) => write!(f, "placeholder:{s}"),
            Selector::Text(s) => write!(f, "text:{s}"),
            Selector::Css(s) => write!(f, "css:{s}"),
            Selector::XPath(s) => write!(f, "xpath:{s}"),
            Selector::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        let lower = s.to_lowercase();
        let after = |prefix: &str| s.get(prefix.len()..).unwrap_or("").trim().to_string();

        match s {
            "" => Selector::Invalid("Empty selector".to_string()),
            _ if lower.starts_with("testid:") => Selector::TestId(after("testid:")),
            _ if lower.starts_with("role:") => {
                let rest = s.get("role:".len()..).unwrap_or("");
                match rest.split_once('|') {
                    Some((role, name)) => Selector::Role {
                        role: role.trim().to_string(),
                        name: Some(
                            name.trim()
                                .strip_prefix("name:")
                                .unwrap_or(name.trim())
                                .to_string(),
                        ),
                    },
                    None => Selector::Role {
                        role: rest.trim().to_string(),
                        name: None,
                    },
                }
            }
            _ if lower.starts_with("label:") => Selector::Label(after("label:")),
            _ if lower.starts_with("placeholder:") => Selector::Placeholder(after("placeholder:")),
            _ if lower.starts_with("text:") => Selector::Text(after("text:")),
            _ if lower.starts_with("css:") => Selector::Css(after("css:")),
            _ if lower.starts_with("xpath:") => Selector::XPath(after("xpath:")),
            _ if s.starts_with("//") || s.starts_with("(//") => Selector::XPath(s.to_string()),
            _ if s.starts_with('#') => Selector::Css(s.to_string()),
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'testid:', 'role:', 'label:', 'placeholder:', 'text:', 'css:' or 'xpath:' to specify the selector type."
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

impl Serialize for Selector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Selector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Selector::from(raw.as_str()))
    }
}
