//! Bounded, blocking text queue over POSIX shared memory.
//!
//! One producer process and one consumer process attach to the same named
//! segment. `push` blocks while the queue is full and `pop` blocks while it is
//! empty; neither has a timeout. A consumer with no producer waits forever.
//!
//! # Memory layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ QueueHeader (state, dims, pthread mutex + 2 condvars,       │
//! │              head, tail, count)           padded to 64 B    │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Slot[0]: len: u64 + bytes[max_message_size]  (stride % 8)   │
//! │ Slot[1]                                                     │
//! │ ...                                                         │
//! │ Slot[capacity-1]                                            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The mutex and condition variables are initialised `PTHREAD_PROCESS_SHARED`
//! inside the segment itself. `state` moves `UNINIT → INITIALIZING → READY`
//! exactly once, by whichever process won the `O_EXCL` create; attachers wait
//! for `READY` and never touch the header fields before that.

use std::{
    ffi::CString,
    ptr,
    sync::atomic::{AtomicU32, Ordering},
    time::{Duration, Instant},
};

use tracing::{debug, info};

use crate::error::{MeshError, Result};

const STATE_INITIALIZING: u32 = 1;
const STATE_READY: u32 = 2;

/// How long `attach` waits for a concurrent creator to finish initialising.
const ATTACH_READY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Shared (mmap) structures
// ---------------------------------------------------------------------------

#[repr(C)]
struct QueueHeader {
    state: AtomicU32,
    capacity: u32,
    max_message_size: u32,
    slot_stride: u32,
    mutex: libc::pthread_mutex_t,
    not_empty: libc::pthread_cond_t,
    not_full: libc::pthread_cond_t,
    head: u32,
    tail: u32,
    count: u32,
}

const fn round_up(n: usize, to: usize) -> usize {
    n.div_ceil(to) * to
}

const HEADER_SIZE: usize = round_up(std::mem::size_of::<QueueHeader>(), 64);
const SLOT_LEN_SIZE: usize = std::mem::size_of::<u64>();

fn slot_stride(max_message_size: u32) -> usize {
    round_up(SLOT_LEN_SIZE + max_message_size as usize, 8)
}

fn segment_size(capacity: u32, max_message_size: u32) -> usize {
    HEADER_SIZE + slot_stride(max_message_size) * capacity as usize
}

fn shm_path(name: &str) -> Result<CString> {
    let path = if name.starts_with('/') { name.to_string() } else { format!("/{name}") };
    CString::new(path).map_err(|_| MeshError::Shm(format!("bad shm name '{name}'")))
}

fn os_err(what: &str, name: &str) -> MeshError {
    MeshError::Shm(format!("{what} '{name}': {}", std::io::Error::last_os_error()))
}

// ---------------------------------------------------------------------------
// BoundedTextQueue
// ---------------------------------------------------------------------------

/// Single-producer / single-consumer text queue in a named shm segment.
pub struct BoundedTextQueue {
    base: *mut u8,
    total_size: usize,
    capacity: u32,
    max_message_size: u32,
    stride: usize,
    name: String,
}

// SAFETY: `base` points to a MAP_SHARED mapping that lives until Drop. All
// mutable header and slot access happens under the process-shared mutex.
unsafe impl Send for BoundedTextQueue {}
unsafe impl Sync for BoundedTextQueue {}

impl BoundedTextQueue {
    /// Create a fresh segment, replacing any stale one with the same name.
    ///
    /// Messages must be shorter than `max_message_size` bytes.
    pub fn create(name: &str, capacity: u32, max_message_size: u32) -> Result<Self> {
        let path = shm_path(name)?;
        // SAFETY: plain unlink of a name we own; failure (no such segment) is fine.
        unsafe {
            libc::shm_unlink(path.as_ptr());
        }
        match Self::create_exclusive(name, capacity, max_message_size)? {
            Some(q) => Ok(q),
            None => Err(MeshError::Shm(format!("'{name}' recreated concurrently"))),
        }
    }

    /// Attach to the segment if it exists, else create it.
    ///
    /// Safe for both sides to call concurrently: exactly one wins the
    /// exclusive create and initialises; the other attaches.
    pub fn open_or_create(name: &str, capacity: u32, max_message_size: u32) -> Result<Self> {
        match Self::create_exclusive(name, capacity, max_message_size)? {
            Some(q) => Ok(q),
            None => Self::attach(name),
        }
    }

    /// Attach to an existing segment without re-initialising it.
    ///
    /// Dimensions come from the segment header.
    pub fn attach(name: &str) -> Result<Self> {
        let path = shm_path(name)?;
        let deadline = Instant::now() + ATTACH_READY_TIMEOUT;

        // SAFETY: POSIX shm_open + fstat + mmap on a segment another process
        // created. The header is only read after `state` reads READY.
        unsafe {
            let fd = libc::shm_open(path.as_ptr(), libc::O_RDWR, 0o666);
            if fd < 0 {
                return Err(os_err("shm_open", name));
            }

            // The creator truncates right after O_EXCL; wait for the size.
            let total_size = loop {
                let mut st: libc::stat = std::mem::zeroed();
                if libc::fstat(fd, &mut st) != 0 {
                    libc::close(fd);
                    return Err(os_err("fstat", name));
                }
                if st.st_size as usize >= HEADER_SIZE {
                    break st.st_size as usize;
                }
                if Instant::now() >= deadline {
                    libc::close(fd);
                    return Err(MeshError::Shm(format!("'{name}' never sized by its creator")));
                }
                std::thread::sleep(Duration::from_millis(1));
            };

            let base = libc::mmap(
                ptr::null_mut(),
                total_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            );
            libc::close(fd);
            if base == libc::MAP_FAILED {
                return Err(os_err("mmap", name));
            }
            let base = base as *mut u8;
            let header = base as *const QueueHeader;

            while (*header).state.load(Ordering::Acquire) != STATE_READY {
                if Instant::now() >= deadline {
                    libc::munmap(base as *mut libc::c_void, total_size);
                    return Err(MeshError::Shm(format!("'{name}' never became ready")));
                }
                std::thread::sleep(Duration::from_millis(1));
            }

            let capacity = (*header).capacity;
            let max_message_size = (*header).max_message_size;
            if segment_size(capacity, max_message_size) != total_size {
                libc::munmap(base as *mut libc::c_void, total_size);
                return Err(MeshError::Shm(format!(
                    "'{name}' size {total_size} does not match header {capacity}x{max_message_size}"
                )));
            }

            info!("[shm] attached '{}' capacity={} max_msg={}", name, capacity, max_message_size);
            Ok(Self {
                base,
                total_size,
                capacity,
                max_message_size,
                stride: slot_stride(max_message_size),
                name: name.to_string(),
            })
        }
    }

    /// `Ok(None)` when the segment already exists.
    fn create_exclusive(name: &str, capacity: u32, max_message_size: u32) -> Result<Option<Self>> {
        if capacity == 0 {
            return Err(MeshError::Shm("capacity must be > 0".into()));
        }
        if max_message_size < 2 {
            return Err(MeshError::Shm("max_message_size must be >= 2".into()));
        }
        let path = shm_path(name)?;
        let total_size = segment_size(capacity, max_message_size);

        // SAFETY: POSIX shm_open(O_EXCL) + ftruncate + mmap. Only the process
        // whose O_EXCL succeeded writes the header, before publishing READY.
        unsafe {
            let fd = libc::shm_open(path.as_ptr(), libc::O_CREAT | libc::O_EXCL | libc::O_RDWR, 0o666);
            if fd < 0 {
                if std::io::Error::last_os_error().raw_os_error() == Some(libc::EEXIST) {
                    return Ok(None);
                }
                return Err(os_err("shm_open", name));
            }

            if libc::ftruncate(fd, total_size as libc::off_t) != 0 {
                let err = os_err("ftruncate", name);
                libc::close(fd);
                libc::shm_unlink(path.as_ptr());
                return Err(err);
            }

            let base = libc::mmap(
                ptr::null_mut(),
                total_size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            );
            libc::close(fd);
            if base == libc::MAP_FAILED {
                let err = os_err("mmap", name);
                libc::shm_unlink(path.as_ptr());
                return Err(err);
            }
            let base = base as *mut u8;
            let header = base as *mut QueueHeader;

            // ftruncate zero-fills, so state already reads UNINIT.
            (*header).state.store(STATE_INITIALIZING, Ordering::Relaxed);
            (*header).capacity = capacity;
            (*header).max_message_size = max_message_size;
            (*header).slot_stride = slot_stride(max_message_size) as u32;
            (*header).head = 0;
            (*header).tail = 0;
            (*header).count = 0;

            if let Err(e) = init_sync(header) {
                libc::munmap(base as *mut libc::c_void, total_size);
                libc::shm_unlink(path.as_ptr());
                return Err(e);
            }

            (*header).state.store(STATE_READY, Ordering::Release);

            info!("[shm] created '{}' capacity={} max_msg={} bytes={}", name, capacity, max_message_size, total_size);
            Ok(Some(Self {
                base,
                total_size,
                capacity,
                max_message_size,
                stride: slot_stride(max_message_size),
                name: name.to_string(),
            }))
        }
    }

    /// Remove the named segment. Existing mappings stay valid.
    pub fn remove(name: &str) -> Result<()> {
        let path = shm_path(name)?;
        // SAFETY: shm_unlink only touches the name table.
        if unsafe { libc::shm_unlink(path.as_ptr()) } != 0 {
            return Err(os_err("shm_unlink", name));
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Queue operations
    // -----------------------------------------------------------------------

    /// Append a message, blocking while the queue is full.
    ///
    /// Fails with [`MeshError::MessageTooLarge`] without touching the queue
    /// when `message.len() >= max_message_size`.
    pub fn push(&self, message: &str) -> Result<()> {
        let bytes = message.as_bytes();
        let max = self.max_message_size as usize;
        if bytes.len() >= max {
            return Err(MeshError::MessageTooLarge { len: bytes.len(), max });
        }

        let guard = self.lock()?;
        let h = self.header();
        // SAFETY: header fields and slots are only accessed under the mutex.
        // pthread_cond_wait releases and re-acquires it.
        unsafe {
            while (*h).count == (*h).capacity {
                libc::pthread_cond_wait(&raw mut (*h).not_full, &raw mut (*h).mutex);
            }
            let slot = self.slot((*h).tail);
            ptr::write_unaligned(slot as *mut u64, bytes.len() as u64);
            ptr::copy_nonoverlapping(bytes.as_ptr(), slot.add(SLOT_LEN_SIZE), bytes.len());
            (*h).tail = ((*h).tail + 1) % (*h).capacity;
            (*h).count += 1;
            libc::pthread_cond_signal(&raw mut (*h).not_empty);
        }
        drop(guard);
        Ok(())
    }

    /// Remove the oldest message, blocking while the queue is empty.
    pub fn pop(&self) -> Result<String> {
        let guard = self.lock()?;
        let h = self.header();
        // SAFETY: see `push`.
        let message = unsafe {
            while (*h).count == 0 {
                libc::pthread_cond_wait(&raw mut (*h).not_empty, &raw mut (*h).mutex);
            }
            let slot = self.slot((*h).head);
            let len = (ptr::read_unaligned(slot as *const u64) as usize).min(self.max_message_size as usize);
            let bytes = std::slice::from_raw_parts(slot.add(SLOT_LEN_SIZE), len);
            let message = String::from_utf8_lossy(bytes).into_owned();
            (*h).head = ((*h).head + 1) % (*h).capacity;
            (*h).count -= 1;
            libc::pthread_cond_signal(&raw mut (*h).not_full);
            message
        };
        drop(guard);
        debug!("[shm] pop {} bytes from '{}'", message.len(), self.name);
        Ok(message)
    }

    /// Messages currently queued.
    pub fn len(&self) -> Result<usize> {
        let _guard = self.lock()?;
        // SAFETY: read under the mutex.
        Ok(unsafe { (*self.header()).count } as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn max_message_size(&self) -> u32 {
        self.max_message_size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    #[inline]
    fn header(&self) -> *mut QueueHeader {
        self.base as *mut QueueHeader
    }

    #[inline]
    fn slot(&self, index: u32) -> *mut u8 {
        // SAFETY: index < capacity, so the slot lies inside the mapping.
        unsafe { self.base.add(HEADER_SIZE + index as usize * self.stride) }
    }

    fn lock(&self) -> Result<QueueGuard<'_>> {
        // SAFETY: the mutex was initialised before READY was published.
        let rc = unsafe { libc::pthread_mutex_lock(&raw mut (*self.header()).mutex) };
        if rc != 0 {
            return Err(MeshError::Shm(format!(
                "mutex lock on '{}': {}",
                self.name,
                std::io::Error::from_raw_os_error(rc)
            )));
        }
        Ok(QueueGuard { queue: self })
    }
}

impl Drop for BoundedTextQueue {
    fn drop(&mut self) {
        // SAFETY: unmapping our own mapping; the segment persists for the peer.
        unsafe {
            libc::munmap(self.base as *mut libc::c_void, self.total_size);
        }
    }
}

/// Holds the queue mutex; unlocks on drop.
struct QueueGuard<'a> {
    queue: &'a BoundedTextQueue,
}

impl Drop for QueueGuard<'_> {
    fn drop(&mut self) {
        // SAFETY: this guard was created by a successful lock.
        unsafe {
            libc::pthread_mutex_unlock(&raw mut (*self.queue.header()).mutex);
        }
    }
}

/// Initialise the process-shared mutex and condition variables in place.
///
/// # Safety
/// `header` must point into a writable mapping not yet visible as READY.
unsafe fn init_sync(header: *mut QueueHeader) -> Result<()> {
    let check = |rc: libc::c_int, what: &str| {
        if rc == 0 {
            Ok(())
        } else {
            Err(MeshError::Shm(format!("{what}: {}", std::io::Error::from_raw_os_error(rc))))
        }
    };

    // SAFETY: attribute objects live on this stack frame; targets live in
    // the mapping.
    unsafe {
        let mut mattr: libc::pthread_mutexattr_t = std::mem::zeroed();
        check(libc::pthread_mutexattr_init(&mut mattr), "pthread_mutexattr_init")?;
        check(
            libc::pthread_mutexattr_setpshared(&mut mattr, libc::PTHREAD_PROCESS_SHARED),
            "pthread_mutexattr_setpshared",
        )?;
        let rc = libc::pthread_mutex_init(&raw mut (*header).mutex, &mattr);
        libc::pthread_mutexattr_destroy(&mut mattr);
        check(rc, "pthread_mutex_init")?;

        let mut cattr: libc::pthread_condattr_t = std::mem::zeroed();
        check(libc::pthread_condattr_init(&mut cattr), "pthread_condattr_init")?;
        check(
            libc::pthread_condattr_setpshared(&mut cattr, libc::PTHREAD_PROCESS_SHARED),
            "pthread_condattr_setpshared",
        )?;
        let rc_empty = libc::pthread_cond_init(&raw mut (*header).not_empty, &cattr);
        let rc_full = libc::pthread_cond_init(&raw mut (*header).not_full, &cattr);
        libc::pthread_condattr_destroy(&mut cattr);
        check(rc_empty, "pthread_cond_init(not_empty)")?;
        check(rc_full, "pthread_cond_init(not_full)")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Barrier},
        thread,
    };

    use proptest::prelude::*;

    use super::*;

    fn unique(tag: &str) -> String {
        use std::sync::atomic::AtomicUsize;
        static SEQ: AtomicUsize = AtomicUsize::new(0);
        format!("bm_test_{}_{}_{}", std::process::id(), tag, SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Unlinks the segment when the test ends, pass or fail.
    struct Cleanup(String);

    impl Drop for Cleanup {
        fn drop(&mut self) {
            let _ = BoundedTextQueue::remove(&self.0);
        }
    }

    #[test]
    fn fifo_with_wraparound() {
        let name = unique("fifo");
        let _c = Cleanup(name.clone());
        let q = BoundedTextQueue::create(&name, 4, 64).unwrap();

        for round in 0..5 {
            for i in 0..3 {
                q.push(&format!("r{round}m{i}")).unwrap();
            }
            assert_eq!(q.len().unwrap(), 3);
            for i in 0..3 {
                assert_eq!(q.pop().unwrap(), format!("r{round}m{i}"));
            }
        }
        assert!(q.is_empty().unwrap());
    }

    #[test]
    fn too_large_rejected_without_mutation() {
        let name = unique("large");
        let _c = Cleanup(name.clone());
        let q = BoundedTextQueue::create(&name, 2, 8).unwrap();

        q.push("1234567").unwrap();
        match q.push("12345678") {
            Err(MeshError::MessageTooLarge { len: 8, max: 8 }) => {}
            other => panic!("expected MessageTooLarge, got {other:?}"),
        }
        assert_eq!(q.len().unwrap(), 1);
        assert_eq!(q.pop().unwrap(), "1234567");
        assert!(q.is_empty().unwrap());
    }

    #[test]
    fn attached_handle_sees_creator() {
        let name = unique("attach");
        let _c = Cleanup(name.clone());
        let producer = BoundedTextQueue::create(&name, 8, 128).unwrap();
        let consumer = BoundedTextQueue::attach(&name).unwrap();
        assert_eq!(consumer.capacity(), 8);
        assert_eq!(consumer.max_message_size(), 128);

        producer.push("10Y|99-310:10000000|100-000:10000000").unwrap();
        assert_eq!(consumer.len().unwrap(), 1);
        assert_eq!(consumer.pop().unwrap(), "10Y|99-310:10000000|100-000:10000000");
        assert!(producer.is_empty().unwrap());
    }

    #[test]
    fn attach_missing_segment_fails() {
        let name = unique("missing");
        assert!(matches!(BoundedTextQueue::attach(&name), Err(MeshError::Shm(_))));
    }

    #[test]
    fn concurrent_open_or_create_initialises_once() {
        let name = unique("race");
        let _c = Cleanup(name.clone());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let (name, barrier) = (name.clone(), barrier.clone());
                thread::spawn(move || {
                    barrier.wait();
                    BoundedTextQueue::open_or_create(&name, 16, 64).unwrap()
                })
            })
            .collect();
        let mut queues: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let b = queues.pop().unwrap();
        let a = queues.pop().unwrap();

        a.push("one").unwrap();
        b.push("two").unwrap();
        assert_eq!(b.pop().unwrap(), "one");
        assert_eq!(a.pop().unwrap(), "two");
    }

    #[test]
    fn pop_wakes_on_push() {
        let name = unique("wake");
        let _c = Cleanup(name.clone());
        let q = BoundedTextQueue::create(&name, 2, 32).unwrap();
        let consumer = BoundedTextQueue::attach(&name).unwrap();

        let t = thread::spawn(move || consumer.pop().unwrap());
        thread::sleep(Duration::from_millis(50));
        q.push("hello").unwrap();
        assert_eq!(t.join().unwrap(), "hello");
    }

    #[test]
    fn push_blocks_while_full() {
        let name = unique("full");
        let _c = Cleanup(name.clone());
        let q = Arc::new(BoundedTextQueue::create(&name, 1, 32).unwrap());
        q.push("a").unwrap();

        let (tx, rx) = crossbeam_channel::bounded(1);
        let producer = q.clone();
        let t = thread::spawn(move || {
            producer.push("b").unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err(), "push returned while full");
        assert_eq!(q.pop().unwrap(), "a");
        rx.recv_timeout(Duration::from_secs(2)).unwrap();
        t.join().unwrap();
        assert_eq!(q.pop().unwrap(), "b");
    }

    #[test]
    fn consumer_without_producer_never_returns() {
        let name = unique("hang");
        let _c = Cleanup(name.clone());
        let q = Arc::new(BoundedTextQueue::create(&name, 4, 32).unwrap());

        let (tx, rx) = crossbeam_channel::bounded(1);
        let consumer = q.clone();
        // Left blocked in pop; the thread dies with the test process.
        thread::spawn(move || {
            let _ = tx.send(consumer.pop());
        });

        assert!(rx.recv_timeout(Duration::from_secs(2)).is_err());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push(String),
        Pop,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            "[a-zA-Z0-9|:;,.-]{0,40}".prop_map(Op::Push),
            Just(Op::Pop),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn matches_fifo_model(ops in prop::collection::vec(op(), 1..200), cap in 1u32..8) {
            let name = unique("prop");
            let _c = Cleanup(name.clone());
            let q = BoundedTextQueue::create(&name, cap, 48).unwrap();
            let mut model = VecDeque::new();

            for op in ops {
                match op {
                    // Only issue calls that cannot block.
                    Op::Push(m) if model.len() < cap as usize => {
                        q.push(&m).unwrap();
                        model.push_back(m);
                    }
                    Op::Pop if !model.is_empty() => {
                        prop_assert_eq!(q.pop().unwrap(), model.pop_front().unwrap());
                    }
                    _ => {}
                }
                let len = q.len().unwrap();
                prop_assert!(len <= cap as usize);
                prop_assert_eq!(len, model.len());
            }
        }
    }
}
