//! JSON documents in the data directory and the background writer that saves them.

use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

pub const PEOPLE_FILE: &str = "people.json";
pub const PLAYLISTS_FILE: &str = "playlists.json";
pub const ASSIGNMENTS_FILE: &str = "assignments.json";
pub const SHEETS_DIR: &str = "sheets";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
    #[error("Save queue for {0} is closed")]
    Closed(String),
    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },
}

/// A list of `T` persisted as one pretty-printed JSON array.
#[derive(Debug)]
pub struct JsonStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing file is an empty list.
    pub fn load(&self) -> Result<Vec<T>, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("{} not found, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })
    }

    /// Write the whole list through a temp file and rename.
    pub fn save(&self, items: &[T]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(items).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;

        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        log::debug!("Saved {} items to {}", items.len(), self.path.display());
        Ok(())
    }
}

/// Outcome of the newest write, as reported to `flush`.
type WriteResult = Result<(), String>;

enum Message<T> {
    Save(Vec<T>),
    Flush(Sender<WriteResult>),
}

/// Reduce a burst of queued messages to the newest snapshot plus the flush
/// acknowledgements to send once it is written.
fn coalesce<T>(messages: Vec<Message<T>>) -> (Option<Vec<T>>, Vec<Sender<WriteResult>>) {
    let mut latest = None;
    let mut acks = Vec::new();
    for message in messages {
        match message {
            Message::Save(items) => latest = Some(items),
            Message::Flush(ack) => acks.push(ack),
        }
    }
    (latest, acks)
}

/// Saves snapshots of a collection on a background thread.
///
/// Snapshots queued while a write is in progress collapse into one write of the
/// newest. Dropping the queue writes whatever is pending and joins the thread.
pub struct SaveQueue<T> {
    store: Arc<JsonStore<T>>,
    sender: Option<Sender<Message<T>>>,
    worker: Option<JoinHandle<()>>,
    writes: Arc<AtomicUsize>,
}

impl<T> SaveQueue<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    pub fn new(store: JsonStore<T>) -> Self {
        let store = Arc::new(store);
        let writes = Arc::new(AtomicUsize::new(0));
        let (sender, receiver) = mpsc::channel();

        let worker = {
            let store = Arc::clone(&store);
            let writes = Arc::clone(&writes);
            thread::spawn(move || run_worker(&store, &receiver, &writes))
        };

        Self {
            store,
            sender: Some(sender),
            worker: Some(worker),
            writes,
        }
    }

    pub fn store(&self) -> &JsonStore<T> {
        &self.store
    }

    /// Queue a snapshot for writing.
    pub fn save(&self, items: Vec<T>) -> Result<(), StoreError> {
        self.send(Message::Save(items))
    }

    /// Block until every snapshot queued so far is on disk.
    ///
    /// Fails while the newest snapshot could not be written.
    pub fn flush(&self) -> Result<(), StoreError> {
        let (ack, done) = mpsc::channel();
        self.send(Message::Flush(ack))?;
        done.recv()
            .map_err(|_| self.closed())?
            .map_err(|message| StoreError::Write {
                path: self.store.path().display().to_string(),
                message,
            })
    }

    /// Number of writes performed so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn send(&self, message: Message<T>) -> Result<(), StoreError> {
        self.sender
            .as_ref()
            .ok_or_else(|| self.closed())?
            .send(message)
            .map_err(|_| self.closed())
    }

    fn closed(&self) -> StoreError {
        StoreError::Closed(self.store.path().display().to_string())
    }
}

fn run_worker<T>(store: &JsonStore<T>, receiver: &Receiver<Message<T>>, writes: &AtomicUsize)
where
    T: Serialize + DeserializeOwned,
{
    // Each snapshot is the whole collection, so only the newest write matters
    let mut last: WriteResult = Ok(());

    while let Ok(first) = receiver.recv() {
        let mut batch = vec![first];
        batch.extend(receiver.try_iter());

        let (latest, acks) = coalesce(batch);
        if let Some(items) = latest {
            last = match store.save(&items) {
                Ok(()) => {
                    writes.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
                Err(e) => {
                    log::error!("Failed to save {}: {}", store.path().display(), e);
                    Err(e.to_string())
                }
            };
        }
        for ack in acks {
            let _ = ack.send(last.clone());
        }
    }
}

impl<T> Drop for SaveQueue<T> {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("Save worker for {} panicked", self.store.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Instrument;
    use crate::people::Person;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonStore<Person> = JsonStore::new(dir.path().join(PEOPLE_FILE));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::new(dir.path().join("nested").join(PEOPLE_FILE));
        let people = vec![Person::new("Lena", "Huber", Instrument::Flute)];
        store.save(&people).unwrap();

        assert_eq!(store.load().unwrap(), people);
        assert!(!store.path().with_extension("json.tmp").exists());
        let text = fs::read_to_string(store.path()).unwrap();
        assert!(text.contains("\"FirstName\": \"Lena\""));
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PEOPLE_FILE);
        fs::write(&path, "{ not json").unwrap();
        let store: JsonStore<Person> = JsonStore::new(path);
        assert!(matches!(store.load(), Err(StoreError::Json { .. })));
    }

    #[test]
    fn coalesce_keeps_newest_snapshot() {
        let (a, _ra) = mpsc::channel();
        let (b, _rb) = mpsc::channel();
        let messages = vec![
            Message::Save(vec![1]),
            Message::Flush(a),
            Message::Save(vec![1, 2]),
            Message::Save(vec![1, 2, 3]),
            Message::Flush(b),
        ];
        let (latest, acks) = coalesce(messages);
        assert_eq!(latest, Some(vec![1, 2, 3]));
        assert_eq!(acks.len(), 2);

        let (latest, acks) = coalesce::<u8>(vec![]);
        assert!(latest.is_none() && acks.is_empty());
    }

    #[test]
    fn queue_writes_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numbers.json");
        let queue = SaveQueue::new(JsonStore::<u32>::new(&path));

        for n in 1..=5 {
            queue.save((1..=n).collect()).unwrap();
        }
        queue.flush().unwrap();

        assert!(queue.writes() >= 1 && queue.writes() <= 5);
        assert_eq!(queue.store().load().unwrap(), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn flush_reports_failed_write() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        let queue = SaveQueue::new(JsonStore::<u32>::new(blocker.join(PEOPLE_FILE)));

        queue.save(vec![1]).unwrap();
        assert!(matches!(queue.flush(), Err(StoreError::Write { .. })));
        assert_eq!(queue.writes(), 0);
        assert!(!blocker.join(PEOPLE_FILE).exists());

        // Still failing: the snapshot never reached the disk
        assert!(queue.flush().is_err());
    }

    #[test]
    fn later_successful_write_clears_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("numbers.json");
        fs::write(dir.path().join("sub"), b"").unwrap();
        let queue = SaveQueue::new(JsonStore::<u32>::new(&path));

        queue.save(vec![1]).unwrap();
        assert!(queue.flush().is_err());

        fs::remove_file(dir.path().join("sub")).unwrap();
        queue.save(vec![1, 2]).unwrap();
        queue.flush().unwrap();
        assert_eq!(queue.store().load().unwrap(), vec![1, 2]);
    }

    #[test]
    fn drop_writes_pending_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("numbers.json");
        {
            let queue = SaveQueue::new(JsonStore::<u32>::new(&path));
            queue.save(vec![7, 8]).unwrap();
        }
        let store = JsonStore::<u32>::new(&path);
        assert_eq!(store.load().unwrap(), vec![7, 8]);
    }
}
