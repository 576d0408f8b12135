//! playlist fields, one per mood, editable from the dashboard.

use crate::domain::{Mood, PlaylistMap};
use std::sync::{Arc, RwLock};

/// source of the three user-editable playlist values
pub trait PlaylistFieldReader: Send + Sync {
    fn field(&self, mood: Mood) -> String;
}

/// the dashboard's input fields, seeded from `[playlists]` in host.toml
#[derive(Default)]
pub struct PlaylistFields {
    values: RwLock<PlaylistMap>,
}

impl PlaylistFields {
    pub fn new(initial: PlaylistMap) -> Self {
        Self { values: RwLock::new(initial) }
    }

    pub fn snapshot(&self) -> PlaylistMap {
        self.values.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// replace all three values (the dashboard form posts the whole map)
    pub fn replace(&self, values: PlaylistMap) {
        *self.values.write().unwrap_or_else(|p| p.into_inner()) = values;
    }
}

impl PlaylistFieldReader for PlaylistFields {
    fn field(&self, mood: Mood) -> String {
        self.values.read().unwrap_or_else(|p| p.into_inner()).get(mood).to_string()
    }
}

pub struct PlaylistResolver {
    fields: Arc<dyn PlaylistFieldReader>,
}

impl PlaylistResolver {
    pub fn new(fields: Arc<dyn PlaylistFieldReader>) -> Self {
        Self { fields }
    }

    /// current field values, no validation
    pub fn resolve(&self) -> PlaylistMap {
        let mut map = PlaylistMap::default();
        for mood in Mood::ALL {
            map.set(mood, self.fields.field(mood));
        }
        map
    }
}
