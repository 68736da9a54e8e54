//! A thread-based section generation manager. Sections are generated by a pool of
//! workers and returned to the handle, which is polled by the world on each tick. The
//! world stays the only one to validate and publish sections, workers never see it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use std::sync::Arc;
use std::thread;
use std::io;

use crossbeam_channel::{bounded, unbounded, Sender, Receiver, TryRecvError};

use tracing::trace;

use crate::wfc::{SectionGenerator, GeneratedSection};


/// This structure is a handle around the section generation workers.
pub struct SectionStorage {
    /// Request sender to generation workers.
    request_sender: Sender<GenRequest>,
    /// Reply receiver from generation workers.
    reply_receiver: Receiver<SectionReply>,
    /// Sections requested and not yet polled.
    pending: HashSet<(i32, i32)>,
    /// Internal statistics tracker.
    stats: Arc<Stats>,
}

/// A generation worker, many of them are sharing the same request channel.
struct GenWorker<G: SectionGenerator> {
    /// The shared generator.
    generator: Arc<G>,
    /// Request receiver from the handle.
    request_receiver: Receiver<GenRequest>,
    /// Reply sender to the handle.
    reply_sender: Sender<SectionReply>,
    /// Internal statistics tracker.
    stats: Arc<Stats>,
}

/// Internal statistics about performance of section generation.
#[derive(Debug, Default)]
struct Stats {
    /// Total duration of generation, in μs.
    gen_duration: AtomicU64,
    /// Number of samples added to 'gen_duration'.
    gen_count: AtomicU64,
}

impl SectionStorage {

    /// Create a new section storage backed by the given number of generation workers,
    /// at least one worker is always started.
    pub fn new<G>(generator: Arc<G>, workers: usize) -> io::Result<Self>
    where
        G: SectionGenerator + Sync + Send + 'static,
    {

        let workers = workers.max(1);

        let (
            request_sender,
            request_receiver,
        ) = bounded(64 * workers);

        // Replies are not bounded because the handle is only polled once per tick and
        // a blocked worker would in turn block the request channel.
        let (
            reply_sender,
            reply_receiver,
        ) = unbounded();

        let stats = Arc::new(Stats::default());

        for i in 0..workers {

            let worker = GenWorker {
                generator: Arc::clone(&generator),
                request_receiver: request_receiver.clone(),
                reply_sender: reply_sender.clone(),
                stats: Arc::clone(&stats),
            };

            thread::Builder::new()
                .name(format!("Section Worker #{i}"))
                .spawn(move || worker.run())?;

        }

        Ok(Self {
            request_sender,
            reply_receiver,
            pending: HashSet::new(),
            stats,
        })

    }

    /// Request generation of a section, that will later be returned by polling this
    /// storage. Returns false if that section is already pending.
    pub fn request(&mut self, sx: i32, sy: i32) -> bool {

        if !self.pending.insert((sx, sy)) {
            return false;
        }

        self.request_sender.send(GenRequest { sx, sy })
            .expect("worker should not disconnect while this handle exists");

        true

    }

    /// Return true if the given section has been requested and not yet polled.
    #[inline]
    pub fn is_pending(&self, sx: i32, sy: i32) -> bool {
        self.pending.contains(&(sx, sy))
    }

    /// Number of sections requested and not yet polled.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Poll without blocking this storage for a generated section. This function
    /// returns none if there is not new reply to poll.
    pub fn poll(&mut self) -> Option<SectionReply> {
        match self.reply_receiver.try_recv() {
            Ok(reply) => {
                self.pending.remove(&(reply.sx, reply.sy));
                Some(reply)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => panic!("worker should not disconnect while this handle exists"),
        }
    }

    /// Average generation duration of a section, if any has been generated.
    pub fn average_duration(&self) -> Option<Duration> {
        // NOTE: Duration and count are not synchronized together, this is only an
        // approximation.
        let count = self.stats.gen_count.load(Ordering::Relaxed);
        if count == 0 {
            None
        } else {
            let total = self.stats.gen_duration.load(Ordering::Relaxed);
            Some(Duration::from_micros(total / count))
        }
    }

}

impl<G: SectionGenerator> GenWorker<G> {

    fn run(self) {
        // Run while the channel is existing, so while the handle exists.
        while let Ok(GenRequest { sx, sy }) = self.request_receiver.recv() {

            let start = Instant::now();
            let generated = self.generator.generate(sx, sy);
            let duration = start.elapsed();
            self.stats.gen_duration.fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
            self.stats.gen_count.fetch_add(1, Ordering::Relaxed);

            trace!(sx, sy, ?duration, "section generated by worker");

            if self.reply_sender.send(SectionReply { sx, sy, generated }).is_err() {
                break;
            }

        }
    }

}

/// A request for generating a section.
#[derive(Debug)]
struct GenRequest {
    sx: i32,
    sy: i32,
}

/// A section generated by a worker, that still needs to be validated against its
/// neighbors before joining the world.
#[derive(Debug)]
pub struct SectionReply {
    pub sx: i32,
    pub sy: i32,
    pub generated: GeneratedSection,
}


#[cfg(test)]
mod tests {

    use super::*;
    use crate::config::GenConfig;
    use crate::grammar::Grammar;
    use crate::wfc::WfcGenerator;

    #[test]
    fn requests_are_deduplicated_and_returned() {

        let config = GenConfig { section_size: 8, ..GenConfig::with_seed(3) };
        let generator = Arc::new(WfcGenerator::new(Arc::new(Grammar::coastline()), &config));
        let mut storage = SectionStorage::new(Arc::clone(&generator), 2).unwrap();

        assert!(storage.request(0, 0));
        assert!(!storage.request(0, 0));
        assert!(storage.request(-1, 2));
        assert!(storage.is_pending(-1, 2));
        assert_eq!(storage.pending_count(), 2);

        let mut replies = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(30);
        while replies.len() < 2 && Instant::now() < deadline {
            match storage.poll() {
                Some(reply) => replies.push(reply),
                None => thread::sleep(Duration::from_millis(1)),
            }
        }

        assert_eq!(replies.len(), 2);
        assert_eq!(storage.pending_count(), 0);
        assert!(storage.average_duration().is_some());

        for reply in replies {
            assert_eq!(reply.generated.section, generator.generate(reply.sx, reply.sy).section);
        }

    }

}
