//! Current user profile

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::EntityId;

/// Currencies supported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    /// Russian ruble.
    #[serde(rename = "₽")]
    Ruble,
    /// US dollar.
    #[default]
    #[serde(rename = "$")]
    Dollar,
    /// Euro.
    #[serde(rename = "€")]
    Euro,
    /// Chinese yuan.
    #[serde(rename = "¥")]
    Yuan,
}

impl Currency {
    /// Returns the currency symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Ruble => "₽",
            Self::Dollar => "$",
            Self::Euro => "€",
            Self::Yuan => "¥",
        }
    }

    /// Parses a currency symbol.
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "₽" => Some(Self::Ruble),
            "$" => Some(Self::Dollar),
            "€" => Some(Self::Euro),
            "¥" => Some(Self::Yuan),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Interface language preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English (default).
    #[default]
    English,
    /// Russian.
    Russian,
}

/// Profile of the authenticated user.
///
/// Derived from the server on each load. It is only meaningful while the
/// access token that fetched it is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCurrentUser")]
pub struct CurrentUser {
    /// Server-side user identifier.
    pub id: EntityId,
    /// Name shown in the interface.
    pub display_name: String,
    /// Main account currency.
    pub currency: Currency,
    /// Interface language.
    pub language: Language,
}

/// Wire shape of the profile across backend revisions.
///
/// Older revisions send `uuid`/`username`, newer ones `id`/`email`.
#[derive(Deserialize)]
struct RawCurrentUser {
    #[serde(default)]
    id: Option<EntityId>,
    #[serde(default)]
    uuid: Option<EntityId>,
    #[serde(default, alias = "displayName")]
    display_name: Option<String>,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    currency: Option<Currency>,
    #[serde(default)]
    language: Option<Language>,
}

impl TryFrom<RawCurrentUser> for CurrentUser {
    type Error = String;

    fn try_from(raw: RawCurrentUser) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.uuid)
            .ok_or_else(|| "user profile has no identifier".to_string())?;
        let display_name = raw
            .display_name
            .or(raw.username)
            .or(raw.email)
            .unwrap_or_default();

        Ok(Self {
            id,
            display_name,
            currency: raw.currency.unwrap_or_default(),
            language: raw.language.unwrap_or_default(),
        })
    }
}
