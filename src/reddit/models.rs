// reddit-transfer/src/reddit/models.rs
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a paginated listing. `after` is `None` at the end of the listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub after: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Self { items, after: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Subscription {
    pub name: String,
}

impl Subscription {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r/{}", self.name)
    }
}

/// A saved post or comment. The ID is shared by every account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SavedItem {
    Post(String),
    Comment(String),
}

impl SavedItem {
    pub fn id(&self) -> &str {
        match self {
            SavedItem::Post(id) | SavedItem::Comment(id) => id,
        }
    }

    /// Reddit "fullname", the identifier the save and unsave endpoints expect.
    pub fn fullname(&self) -> String {
        let prefix = match self {
            SavedItem::Post(_) => "t3",
            SavedItem::Comment(_) => "t1",
        };
        format!("{}_{}", prefix, self.id())
    }
}

impl fmt::Display for SavedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SavedItem::Post(_) => write!(f, "post {}", self.fullname()),
            SavedItem::Comment(_) => write!(f, "comment {}", self.fullname()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Friend {
    pub name: String,
}

impl Friend {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl fmt::Display for Friend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u/{}", self.name)
    }
}

/// Scalar preference value. Anything else the API returns is not writable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PreferenceValue {
    Flag(bool),
    Number(serde_json::Number),
    Choice(String),
}

impl fmt::Display for PreferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreferenceValue::Flag(b) => write!(f, "{b}"),
            PreferenceValue::Number(n) => write!(f, "{n}"),
            PreferenceValue::Choice(s) => write!(f, "\"{s}\""),
        }
    }
}

pub type Preferences = BTreeMap<String, PreferenceValue>;

/// Keeps scalar entries of a raw preferences object; nulls, arrays and objects are dropped.
pub fn preferences_from_json(raw: serde_json::Map<String, Value>) -> Preferences {
    raw.into_iter()
        .filter_map(|(key, value)| match value {
            Value::Bool(b) => Some((key, PreferenceValue::Flag(b))),
            Value::Number(n) => Some((key, PreferenceValue::Number(n))),
            Value::String(s) => Some((key, PreferenceValue::Choice(s))),
            Value::Null | Value::Array(_) | Value::Object(_) => {
                tracing::debug!(preference = %key, "Skipping non-scalar preference");
                None
            }
        })
        .collect()
}

// --- Wire format -------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListingData<T> {
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default = "Vec::new")]
    pub children: Vec<T>,
}

impl<T> Listing<T> {
    pub fn into_page<U>(self, map: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.data.children.into_iter().map(map).collect(),
            after: self.data.after.filter(|cursor| !cursor.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubredditThing {
    pub data: SubredditData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SubredditData {
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub(crate) enum SavedThing {
    #[serde(rename = "t3")]
    Link(ThingId),
    #[serde(rename = "t1")]
    Comment(ThingId),
}

#[derive(Debug, Deserialize)]
pub(crate) struct ThingId {
    pub id: String,
}

impl From<SavedThing> for SavedItem {
    fn from(thing: SavedThing) -> Self {
        match thing {
            SavedThing::Link(ThingId { id }) => SavedItem::Post(id),
            SavedThing::Comment(ThingId { id }) => SavedItem::Comment(id),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserList {
    pub data: UserListData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListData {
    #[serde(default)]
    pub children: Vec<UserEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserEntry {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Identity {
    pub name: String,
}
