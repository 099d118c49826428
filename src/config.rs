use std::path::PathBuf;

use serde::Serialize;

use crate::mirror::MirrorFormat;

pub const DEFAULT_ROOMS: &str =
    "room-1=Conference Room A;room-2=Conference Room B;room-3=Executive Boardroom";

/// A bookable room: the key stored on bookings plus a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Room {
    pub key: String,
    pub name: String,
}

/// The rooms a service accepts. An open catalog accepts any non-empty key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomCatalog {
    rooms: Vec<Room>,
    open: bool,
}

impl Default for RoomCatalog {
    fn default() -> Self {
        // DEFAULT_ROOMS is well-formed
        Self::parse(DEFAULT_ROOMS).unwrap_or_else(|_| Self::open())
    }
}

impl RoomCatalog {
    pub fn open() -> Self {
        Self {
            rooms: Vec::new(),
            open: true,
        }
    }

    pub fn closed(rooms: Vec<Room>) -> Self {
        Self { rooms, open: false }
    }

    /// `*` for an open catalog, otherwise `key=Display Name` entries separated
    /// by `;`. An entry without `=` uses its key as the name.
    pub fn parse(spec: &str) -> Result<Self, String> {
        let spec = spec.trim();
        if spec == "*" {
            return Ok(Self::open());
        }
        let mut rooms: Vec<Room> = Vec::new();
        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (key, name) = match entry.split_once('=') {
                Some((k, n)) => (k.trim(), n.trim()),
                None => (entry, entry),
            };
            if key.is_empty() {
                return Err(format!("room entry without a key: {entry:?}"));
            }
            if rooms.iter().any(|r| r.key == key) {
                return Err(format!("duplicate room key: {key}"));
            }
            rooms.push(Room {
                key: key.to_string(),
                name: (if name.is_empty() { key } else { name }).to_string(),
            });
        }
        if rooms.is_empty() {
            return Err("no rooms configured".into());
        }
        Ok(Self::closed(rooms))
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn contains(&self, key: &str) -> bool {
        if self.open {
            return !key.trim().is_empty();
        }
        self.rooms.iter().any(|r| r.key == key)
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub site: String,
    pub mirror_format: MirrorFormat,
    pub rooms: RoomCatalog,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            site: "default".into(),
            mirror_format: MirrorFormat::Json,
            rooms: RoomCatalog::default(),
        }
    }
}

impl Config {
    /// Read `BOARDROOM_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(dir) = lookup("BOARDROOM_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(site) = lookup("BOARDROOM_SITE") {
            config.site = site;
        }
        if let Some(format) = lookup("BOARDROOM_MIRROR") {
            config.mirror_format = format.parse()?;
        }
        if let Some(rooms) = lookup("BOARDROOM_ROOMS") {
            config.rooms = RoomCatalog::parse(&rooms)?;
        }
        Ok(config)
    }
}
