use std::io::Error as IoError;

use flume::Sender;

use crate::driver::connection::error::Error as ConnectionError;
use crate::events::Event;
use crate::info::ConnectionInfo;
use crate::input::Input;

#[derive(Debug)]
pub(crate) enum CoreMessage {
    /// Open a connection from complete metadata, answering on the supplied
    /// channel once keys are negotiated (the "safe to play" signal).
    ConnectWithResult(ConnectionInfo, Sender<Result<(), ConnectionError>>),
    /// The signalling channel closed resumably; re-open it in place.
    Reconnect,
    /// The signalling channel is gone for good, with the close code seen.
    FatalWs(Option<u16>),
    /// The UDP transport failed.
    FatalUdp(IoError),
    /// Begin (or switch to) a new audio source.
    Play(Input),
    Stop,
    Pause,
    Unpause,
    /// Attach an observer to the event fan-out.
    Subscribe(Sender<Event>),
    /// Tear the connection down terminally, with events.
    Destroy,
    /// Silent shutdown of all tasks.
    Poison,
}
