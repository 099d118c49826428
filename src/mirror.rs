use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::model::Booking;

/// Durable copy of the whole booking collection.
///
/// A mirror is only ever read in full (once, when the store loads) and written
/// in full (after every mutation). `store` must not return until the snapshot
/// is on disk.
pub trait Mirror: Send + 'static {
    fn load(&mut self) -> io::Result<Vec<Booking>>;
    fn store(&mut self, bookings: &[Booking]) -> io::Result<()>;
    fn path(&self) -> &Path;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorFormat {
    #[default]
    Json,
    Framed,
}

impl MirrorFormat {
    pub fn extension(self) -> &'static str {
        match self {
            MirrorFormat::Json => "json",
            MirrorFormat::Framed => "mirror",
        }
    }

    /// Open a mirror of this format at `path`, creating its directory if needed.
    pub fn open(self, path: PathBuf) -> io::Result<Box<dyn Mirror>> {
        Ok(match self {
            MirrorFormat::Json => Box::new(JsonMirror::open(path)?),
            MirrorFormat::Framed => Box::new(FramedMirror::open(path)?),
        })
    }
}

impl FromStr for MirrorFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(MirrorFormat::Json),
            "framed" => Ok(MirrorFormat::Framed),
            other => Err(format!("unknown mirror format: {other}")),
        }
    }
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write the snapshot to a temp file and fsync, then rename it over `path`.
/// A crash leaves either the old or the new snapshot, never a mix.
fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> io::Result<()> {
    let tmp = tmp_path(path);
    let file = File::create(&tmp)?;
    let mut writer = BufWriter::new(file);
    write(&mut writer)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    fs::rename(&tmp, path)
}

fn read_if_exists(path: &Path) -> io::Result<Option<Vec<u8>>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let mut bytes = Vec::new();
    BufReader::new(file).read_to_end(&mut bytes)?;
    Ok(Some(bytes))
}

// ── JSON ─────────────────────────────────────────────────────

/// A single pretty-printed JSON array with ISO-8601 timestamps.
pub struct JsonMirror {
    path: PathBuf,
}

impl JsonMirror {
    pub fn open(path: PathBuf) -> io::Result<Self> {
        ensure_parent_dir(&path)?;
        Ok(Self { path })
    }
}

impl Mirror for JsonMirror {
    fn load(&mut self) -> io::Result<Vec<Booking>> {
        let Some(bytes) = read_if_exists(&self.path)? else {
            return Ok(Vec::new());
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn store(&mut self, bookings: &[Booking]) -> io::Result<()> {
        write_atomic(&self.path, |w| {
            serde_json::to_writer_pretty(&mut *w, bookings)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            w.write_all(b"\n")
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

// ── Framed binary ────────────────────────────────────────────

/// Encode a single booking to [len][bincode][crc32] format.
fn encode_frame(writer: &mut impl Write, booking: &Booking) -> io::Result<()> {
    let payload =
        bincode::serialize(booking).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(())
}

fn take<'a>(bytes: &mut &'a [u8], n: usize) -> io::Result<&'a [u8]> {
    if bytes.len() < n {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "truncated mirror frame",
        ));
    }
    let (head, tail) = bytes.split_at(n);
    *bytes = tail;
    Ok(head)
}

fn read_u32(bytes: &mut &[u8]) -> io::Result<u32> {
    let raw = take(bytes, 4)?;
    Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

/// Snapshot as a sequence of frames, one per booking.
///
/// Format per frame: `[u32: len][bincode: Booking][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - Snapshots are replaced atomically, so a short or corrupt frame means the
///   file was damaged after the fact and loading fails instead of dropping bookings.
pub struct FramedMirror {
    path: PathBuf,
}

impl FramedMirror {
    pub fn open(path: PathBuf) -> io::Result<Self> {
        ensure_parent_dir(&path)?;
        Ok(Self { path })
    }
}

impl Mirror for FramedMirror {
    fn load(&mut self) -> io::Result<Vec<Booking>> {
        let Some(bytes) = read_if_exists(&self.path)? else {
            return Ok(Vec::new());
        };
        let mut rest = bytes.as_slice();
        let mut bookings = Vec::new();
        while !rest.is_empty() {
            let len = read_u32(&mut rest)? as usize;
            let payload = take(&mut rest, len)?;
            let stored_crc = read_u32(&mut rest)?;
            if stored_crc != crc32fast::hash(payload) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("mirror frame {} failed crc check", bookings.len()),
                ));
            }
            let booking = bincode::deserialize::<Booking>(payload)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            bookings.push(booking);
        }
        Ok(bookings)
    }

    fn store(&mut self, bookings: &[Booking]) -> io::Result<()> {
        write_atomic(&self.path, |w| {
            for booking in bookings {
                encode_frame(w, booking)?;
            }
            Ok(())
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::OpenOptions;
    use crate::model::BookingId;
    use ulid::Ulid;

    fn tmp_file(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("boardroom_test_mirror");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn booking(room: &str, start: i64, end: i64) -> Booking {
        Booking {
            id: BookingId::generate(),
            owner_name: "Grace".into(),
            owner_email: "grace@example.com".into(),
            owner_phone: "555-0100".into(),
            start_time: start,
            end_time: end,
            room: room.into(),
            created_at: 1_792_400_000_000,
        }
    }

    fn sample() -> Vec<Booking> {
        vec![
            booking("room-1", 1_792_490_400_000, 1_792_494_000_000),
            booking("room-2", 1_792_490_400_250, 1_792_494_000_750),
        ]
    }

    #[test]
    fn json_store_and_load() {
        let path = tmp_file("store_and_load.json");
        let mut mirror = JsonMirror::open(path.clone()).unwrap();
        let bookings = sample();
        mirror.store(&bookings).unwrap();

        let mut reopened = JsonMirror::open(path.clone()).unwrap();
        assert_eq!(reopened.load().unwrap(), bookings);
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn json_missing_or_blank_file_is_empty() {
        let path = tmp_file("missing.json");
        let mut mirror = JsonMirror::open(path.clone()).unwrap();
        assert!(mirror.load().unwrap().is_empty());

        fs::write(&path, "  \n").unwrap();
        assert!(mirror.load().unwrap().is_empty());
    }

    #[test]
    fn json_reads_original_data_file() {
        let path = tmp_file("original.json");
        fs::write(
            &path,
            r#"[
  {
    "id": "3f2b8c1e-9a4d-4c6b-8e2f-1a2b3c4d5e6f",
    "user": "Grace",
    "email": "grace@example.com",
    "phone": "555-0100",
    "startTime": "2026-10-20T10:00:00.000Z",
    "endTime": "2026-10-20T11:00:00.000Z",
    "room": "room-3",
    "createdAt": "2026-10-16T08:30:00.000Z"
  }
]"#,
        )
        .unwrap();
        let mut mirror = JsonMirror::open(path).unwrap();
        let loaded = mirror.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id.as_str(), "3f2b8c1e-9a4d-4c6b-8e2f-1a2b3c4d5e6f");
        assert_eq!(loaded[0].room, "room-3");
        assert_eq!(loaded[0].start_time, 1_792_490_400_000);
    }

    #[test]
    fn json_rejects_malformed_file() {
        let path = tmp_file("malformed.json");
        fs::write(&path, "[{\"id\": 12}").unwrap();
        let mut mirror = JsonMirror::open(path).unwrap();
        let err = mirror.load().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn open_creates_parent_dir() {
        let dir = std::env::temp_dir()
            .join("boardroom_test_mirror")
            .join(format!("nested_{}", Ulid::new()));
        let path = dir.join("bookings.json");
        let mut mirror = JsonMirror::open(path).unwrap();
        assert!(dir.is_dir());
        mirror.store(&[]).unwrap();
        assert!(mirror.load().unwrap().is_empty());
    }

    #[test]
    fn framed_store_and_load() {
        let path = tmp_file("store_and_load.mirror");
        let mut mirror = FramedMirror::open(path.clone()).unwrap();
        let bookings = sample();
        mirror.store(&bookings).unwrap();

        let mut reopened = FramedMirror::open(path).unwrap();
        assert_eq!(reopened.load().unwrap(), bookings);
    }

    #[test]
    fn framed_rewrite_replaces_snapshot() {
        let path = tmp_file("rewrite.mirror");
        let mut mirror = FramedMirror::open(path.clone()).unwrap();
        let bookings = sample();
        mirror.store(&bookings).unwrap();
        let before = fs::metadata(&path).unwrap().len();

        mirror.store(&bookings[..1]).unwrap();
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "rewritten snapshot should shrink: {after} < {before}");
        assert_eq!(mirror.load().unwrap(), bookings[..1].to_vec());
    }

    #[test]
    fn framed_missing_file_is_empty() {
        let path = tmp_file("missing.mirror");
        let mut mirror = FramedMirror::open(path).unwrap();
        assert!(mirror.load().unwrap().is_empty());
    }

    #[test]
    fn framed_truncated_tail_is_an_error() {
        let path = tmp_file("truncated.mirror");
        let mut mirror = FramedMirror::open(path.clone()).unwrap();
        mirror.store(&sample()).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[0u8; 6]).unwrap(); // partial length + some bytes
        }
        let err = mirror.load().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn framed_corrupt_crc_is_an_error() {
        let path = tmp_file("corrupt_crc.mirror");
        {
            let payload = bincode::serialize(&sample()[0]).unwrap();
            let len = payload.len() as u32;
            let bad_crc: u32 = 0xDEADBEEF;

            let mut f = File::create(&path).unwrap();
            f.write_all(&len.to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&bad_crc.to_le_bytes()).unwrap();
        }
        let mut mirror = FramedMirror::open(path).unwrap();
        let err = mirror.load().unwrap_err();
        assert!(err.to_string().contains("crc"));
    }

    #[test]
    fn format_parsing() {
        assert_eq!("json".parse::<MirrorFormat>(), Ok(MirrorFormat::Json));
        assert_eq!("Framed".parse::<MirrorFormat>(), Ok(MirrorFormat::Framed));
        assert!("sqlite".parse::<MirrorFormat>().is_err());
        assert_eq!(MirrorFormat::Framed.extension(), "mirror");
    }
}
