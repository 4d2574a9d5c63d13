//! Registry of remote speakers, keyed by RTP synchronisation source.
//!
//! Speaker identities arrive over the signalling channel (speaking and
//! client-connect announcements); their byte streams are driven purely by the
//! data plane. A stream is opened by the first audio datagram since the last
//! quiescence and closed by the silence sweep, so a stream handle exists
//! exactly between a speak-start and its matching speak-end.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use flume::{Receiver, Sender};
use tokio::time::Instant;

use crate::id::UserId;

/// A live remote speaker's stream of decrypted Opus frames.
///
/// Handles are cheap clones over the same underlying channel; two handles
/// compare equal iff they refer to the same opening of the stream.
#[derive(Clone, Debug)]
pub struct SpeakStream {
    id: u64,
    rx: Receiver<Vec<u8>>,
}

impl SpeakStream {
    /// Receives the next Opus frame, or `None` once the stream has closed
    /// and drained.
    pub async fn recv(&self) -> Option<Vec<u8>> {
        self.rx.recv_async().await.ok()
    }

    /// Takes the next Opus frame if one is already buffered.
    pub fn try_recv(&self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

impl PartialEq for SpeakStream {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for SpeakStream {}

struct RemoteSpeaker {
    user_id: UserId,
    tx: Option<Sender<Vec<u8>>>,
    stream: Option<SpeakStream>,
    last_packet: Option<Instant>,
}

impl RemoteSpeaker {
    fn close(&mut self) {
        self.tx = None;
        self.stream = None;
        self.last_packet = None;
    }
}

/// What happened to an inbound frame offered to the registry.
pub(crate) enum PublishOutcome {
    /// The SSRC has not been announced; the frame was dropped.
    Unknown,
    /// This frame (re)opened the speaker's stream.
    Opened(UserId),
    /// The frame was delivered to an already-open stream.
    Delivered,
}

/// Process-wide map of remote speakers, shared by every call of one root
/// context.
#[derive(Default)]
pub(crate) struct SpeakerMap {
    inner: Mutex<HashMap<u32, RemoteSpeaker>>,
    stream_ids: AtomicU64,
}

impl SpeakerMap {
    /// Records (or refreshes) the user behind an SSRC.
    pub fn register(&self, ssrc: u32, user_id: UserId) {
        let mut map = self.lock();

        map.entry(ssrc)
            .and_modify(|speaker| speaker.user_id = user_id)
            .or_insert(RemoteSpeaker {
                user_id,
                tx: None,
                stream: None,
                last_packet: None,
            });
    }

    pub fn is_known(&self, ssrc: u32) -> bool {
        self.lock().contains_key(&ssrc)
    }

    /// Hands out the speaker's current stream, if one is open.
    pub fn get_stream(&self, ssrc: u32) -> Option<SpeakStream> {
        self.lock().get(&ssrc).and_then(|speaker| speaker.stream.clone())
    }

    /// Delivers one decrypted frame to a speaker's stream, opening it if the
    /// speaker was quiescent.
    pub fn publish(&self, ssrc: u32, frame: Vec<u8>, now: Instant) -> PublishOutcome {
        let mut map = self.lock();

        let speaker = match map.get_mut(&ssrc) {
            Some(speaker) => speaker,
            None => return PublishOutcome::Unknown,
        };

        let opened = if speaker.tx.is_none() {
            let (tx, rx) = flume::unbounded();
            let id = self.stream_ids.fetch_add(1, Ordering::Relaxed);

            speaker.tx = Some(tx);
            speaker.stream = Some(SpeakStream { id, rx });

            true
        } else {
            false
        };

        speaker.last_packet = Some(now);

        if let Some(tx) = &speaker.tx {
            // The registry holds a receiver, so delivery cannot fail.
            let _ = tx.send(frame);
        }

        if opened {
            PublishOutcome::Opened(speaker.user_id)
        } else {
            PublishOutcome::Delivered
        }
    }

    /// Closes every stream whose speaker has been silent past `timeout`,
    /// returning the speakers whose quiescence just began.
    pub fn sweep(&self, timeout: Duration, now: Instant) -> Vec<(UserId, u32)> {
        let mut ended = Vec::new();
        let mut map = self.lock();

        for (ssrc, speaker) in map.iter_mut() {
            if let Some(last) = speaker.last_packet {
                if speaker.stream.is_some() && now.saturating_duration_since(last) >= timeout {
                    speaker.close();
                    ended.push((speaker.user_id, *ssrc));
                }
            }
        }

        ended
    }

    /// The earliest instant at which any open stream could time out.
    pub fn next_deadline(&self, timeout: Duration) -> Option<Instant> {
        self.lock()
            .values()
            .filter(|speaker| speaker.stream.is_some())
            .filter_map(|speaker| speaker.last_packet)
            .min()
            .map(|last| last + timeout)
    }

    /// Forgets a user entirely (channel departure), reporting the SSRC and
    /// whether a stream was open at the time.
    pub fn remove_user(&self, user_id: UserId) -> Option<(u32, bool)> {
        let mut map = self.lock();

        let ssrc = map
            .iter()
            .find(|(_, speaker)| speaker.user_id == user_id)
            .map(|(ssrc, _)| *ssrc)?;

        let speaker = map.remove(&ssrc)?;

        Some((ssrc, speaker.stream.is_some()))
    }

    /// Closes the open streams among `ssrcs`, returning the speakers ended.
    pub fn close_streams(&self, ssrcs: &[u32]) -> Vec<(UserId, u32)> {
        let mut ended = Vec::new();
        let mut map = self.lock();

        for ssrc in ssrcs {
            if let Some(speaker) = map.get_mut(ssrc) {
                if speaker.stream.is_some() {
                    speaker.close();
                    ended.push((speaker.user_id, *ssrc));
                }
            }
        }

        ended
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u32, RemoteSpeaker>> {
        self.inner.lock().expect("speaker registry poisoned")
    }
}
