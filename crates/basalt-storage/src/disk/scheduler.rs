//! Asynchronous disk request scheduler.
//!
//! The scheduler owns a background worker thread and a queue of page
//! read/write requests. Every request carries a one-shot completion
//! channel; the caller keeps the receiving end and blocks on it to wait
//! for the request to finish. Requests against distinct pages may complete
//! in any order.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::{self, JoinHandle};

use basalt_common::types::PageId;
use tracing::{debug, error};

use super::error::{DiskError, DiskResult};
use super::manager::DiskManager;

/// A request to perform page I/O.
pub enum DiskRequest {
    /// Read a page; the completed buffer is sent back on `completion`.
    Read {
        /// Page to read.
        page_id: PageId,
        /// One-shot channel receiving the page bytes.
        completion: Sender<DiskResult<Box<[u8]>>>,
    },
    /// Persist a page.
    Write {
        /// Page to write.
        page_id: PageId,
        /// Full-page payload.
        data: Box<[u8]>,
        /// One-shot channel signalling completion.
        completion: Sender<DiskResult<()>>,
    },
}

/// Schedules page I/O onto a dedicated worker thread.
///
/// Dropping the scheduler closes the request queue and joins the worker,
/// so every request scheduled before the drop is completed first.
pub struct DiskScheduler {
    queue: Sender<DiskRequest>,
    worker: Option<JoinHandle<()>>,
}

impl DiskScheduler {
    /// Starts a scheduler driving the given disk manager.
    pub fn new<D: DiskManager + 'static>(mut disk: D) -> Self {
        let (tx, rx) = channel::<DiskRequest>();
        let worker = thread::Builder::new()
            .name("basalt-disk-io".into())
            .spawn(move || {
                while let Ok(request) = rx.recv() {
                    Self::service(&mut disk, request);
                }
                debug!("disk scheduler worker exiting");
            })
            .expect("failed to spawn disk scheduler worker");

        Self {
            queue: tx,
            worker: Some(worker),
        }
    }

    /// Enqueues a raw request.
    pub fn schedule(&self, request: DiskRequest) -> DiskResult<()> {
        self.queue
            .send(request)
            .map_err(|_| DiskError::SchedulerShutDown)
    }

    /// Schedules a page read and returns the completion receiver.
    pub fn schedule_read(&self, page_id: PageId) -> DiskResult<Receiver<DiskResult<Box<[u8]>>>> {
        let (tx, rx) = channel();
        self.schedule(DiskRequest::Read {
            page_id,
            completion: tx,
        })?;
        Ok(rx)
    }

    /// Schedules a page write and returns the completion receiver.
    pub fn schedule_write(
        &self,
        page_id: PageId,
        data: Box<[u8]>,
    ) -> DiskResult<Receiver<DiskResult<()>>> {
        let (tx, rx) = channel();
        self.schedule(DiskRequest::Write {
            page_id,
            data,
            completion: tx,
        })?;
        Ok(rx)
    }

    /// Services one request on the worker thread.
    ///
    /// I/O failures are reported through the completion channel, never by
    /// crashing the worker. A dropped receiver makes the send a no-op.
    fn service<D: DiskManager>(disk: &mut D, request: DiskRequest) {
        match request {
            DiskRequest::Read {
                page_id,
                completion,
            } => {
                let mut buf = vec![0u8; basalt_common::constants::PAGE_SIZE].into_boxed_slice();
                let result = disk.read_page(page_id, &mut buf).map(|()| buf);
                if let Err(e) = &result {
                    error!(page = %page_id, "page read failed: {e}");
                }
                let _ = completion.send(result);
            }
            DiskRequest::Write {
                page_id,
                data,
                completion,
            } => {
                let result = disk.write_page(page_id, &data);
                if let Err(e) = &result {
                    error!(page = %page_id, "page write failed: {e}");
                }
                let _ = completion.send(result);
            }
        }
    }
}

impl Drop for DiskScheduler {
    fn drop(&mut self) {
        // Closing the queue lets the worker drain and exit.
        let (closed, _) = channel();
        self.queue = closed;
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl std::fmt::Debug for DiskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskScheduler")
            .field("worker_alive", &self.worker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disk::MemoryDiskManager;
    use basalt_common::constants::PAGE_SIZE;

    #[test]
    fn test_write_then_read() {
        let scheduler = DiskScheduler::new(MemoryDiskManager::new());

        let mut data = vec![0u8; PAGE_SIZE];
        data[..4].copy_from_slice(b"page");

        let done = scheduler
            .schedule_write(PageId::new(0), data.clone().into_boxed_slice())
            .unwrap();
        done.recv().unwrap().unwrap();

        let pending = scheduler.schedule_read(PageId::new(0)).unwrap();
        let buf = pending.recv().unwrap().unwrap();
        assert_eq!(&buf[..], &data[..]);
    }

    #[test]
    fn test_unwritten_page_reads_zero() {
        let scheduler = DiskScheduler::new(MemoryDiskManager::new());
        let pending = scheduler.schedule_read(PageId::new(42)).unwrap();
        let buf = pending.recv().unwrap().unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_many_outstanding_requests() {
        let scheduler = DiskScheduler::new(MemoryDiskManager::new());

        let mut pending = Vec::new();
        for i in 0..32u64 {
            let mut data = vec![0u8; PAGE_SIZE];
            data[0] = i as u8;
            pending.push(
                scheduler
                    .schedule_write(PageId::new(i), data.into_boxed_slice())
                    .unwrap(),
            );
        }
        for rx in pending {
            rx.recv().unwrap().unwrap();
        }

        for i in 0..32u64 {
            let rx = scheduler.schedule_read(PageId::new(i)).unwrap();
            let buf = rx.recv().unwrap().unwrap();
            assert_eq!(buf[0], i as u8);
        }
    }

    #[test]
    fn test_drop_completes_outstanding_writes() {
        let rx = {
            let scheduler = DiskScheduler::new(MemoryDiskManager::new());
            scheduler
                .schedule_write(PageId::new(1), vec![9u8; PAGE_SIZE].into_boxed_slice())
                .unwrap()
            // scheduler dropped here; the worker drains the queue first
        };
        rx.recv().unwrap().unwrap();
    }
}
