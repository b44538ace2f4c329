//! Wayland display connection, registry handling and global discovery.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};

use wayland_client::backend::WaylandError;
use wayland_client::globals::{registry_queue_init, GlobalList, GlobalListContents};
use wayland_client::protocol::{
    wl_callback, wl_compositor, wl_output, wl_registry, wl_seat, wl_shm, wl_subcompositor,
    wl_surface,
};
use wayland_client::{Connection, Dispatch, EventQueue, Proxy, QueueHandle};

use crate::error::Error;
use crate::output::Output;
use crate::seat::Seat;
use crate::window::WindowInner;
use crate::wm::xdg::XdgWmInner;

const WL_COMPOSITOR_VERSION: u32 = 4;
const WL_SUBCOMPOSITOR_VERSION: u32 = 1;
const WL_SHM_VERSION: u32 = 1;
const WL_OUTPUT_VERSION: u32 = 2;
const WL_SEAT_VERSION: u32 = 5;

/// Observer invoked for every global advertised by the registry, after the
/// display's own handling. Lets other components react to globals the
/// display itself does not know about.
pub trait RegistryObserver {
    /// Called once per advertised global.
    fn global(
        &mut self,
        registry: &wl_registry::WlRegistry,
        qh: &QueueHandle<DisplayState>,
        name: u32,
        interface: &str,
        version: u32,
    );
}

/// State shared between the dispatch machinery and handles owned by the
/// embedding application (windows, the shell handshake).
#[derive(Default)]
pub(crate) struct SharedState {
    windows: Mutex<HashMap<u32, Weak<WindowInner>>>,
    xdg: Mutex<Option<Weak<XdgWmInner>>>,
}

impl SharedState {
    pub(crate) fn register_window(&self, inner: &Arc<WindowInner>) {
        let key = inner.key();
        log::trace!("register window surface {key}");
        self.windows
            .lock()
            .unwrap()
            .insert(key, Arc::downgrade(inner));
    }

    pub(crate) fn unregister_window(&self, key: u32) {
        self.windows.lock().unwrap().remove(&key);
    }

    pub(crate) fn window(&self, key: u32) -> Option<Arc<WindowInner>> {
        let mut map = self.windows.lock().unwrap();
        let window = map.get(&key)?.upgrade();
        if window.is_none() {
            map.remove(&key);
        }
        window
    }

    pub(crate) fn set_xdg(&self, inner: &Arc<XdgWmInner>) {
        *self.xdg.lock().unwrap() = Some(Arc::downgrade(inner));
    }

    pub(crate) fn xdg(&self) -> Option<Arc<XdgWmInner>> {
        self.xdg.lock().unwrap().as_ref()?.upgrade()
    }
}

/// Dispatch state for the display's event queue.
///
/// All `wayland_client::Dispatch` implementations in this crate target this
/// type; it owns everything the event handlers mutate.
pub struct DisplayState {
    pub(crate) compositor: Option<wl_compositor::WlCompositor>,
    pub(crate) compositor_version: u32,
    pub(crate) subcompositor: Option<wl_subcompositor::WlSubcompositor>,
    pub(crate) shm: Option<wl_shm::WlShm>,
    pub(crate) has_xrgb: bool,
    pub(crate) enable_cursor: bool,
    pub(crate) outputs: HashMap<u32, Output>,
    pub(crate) seats: HashMap<u32, Seat>,
    pub(crate) shared: Arc<SharedState>,
    observers: Vec<Box<dyn RegistryObserver>>,
}

impl DisplayState {
    fn new(enable_cursor: bool, shared: Arc<SharedState>) -> Self {
        Self {
            compositor: None,
            compositor_version: 0,
            subcompositor: None,
            shm: None,
            has_xrgb: false,
            enable_cursor,
            outputs: HashMap::new(),
            seats: HashMap::new(),
            shared,
            observers: Vec::new(),
        }
    }

    pub(crate) fn output_mut(&mut self, key: u32) -> Option<&mut Output> {
        self.outputs.get_mut(&key)
    }

    /// Binds a newly advertised global and stores the owned wrapper for
    /// outputs and seats. Singletons are last-bound-wins.
    fn handle_global(
        &mut self,
        registry: &wl_registry::WlRegistry,
        qh: &QueueHandle<Self>,
        name: u32,
        interface: &str,
        version: u32,
    ) {
        match interface {
            "wl_compositor" => {
                self.compositor_version = version;
                self.compositor = Some(registry.bind::<wl_compositor::WlCompositor, _, _>(
                    name,
                    version.min(WL_COMPOSITOR_VERSION),
                    qh,
                    (),
                ));
            }
            "wl_subcompositor" => {
                self.subcompositor = Some(registry.bind::<wl_subcompositor::WlSubcompositor, _, _>(
                    name,
                    version.min(WL_SUBCOMPOSITOR_VERSION),
                    qh,
                    (),
                ));
            }
            "wl_shm" => {
                self.shm = Some(registry.bind::<wl_shm::WlShm, _, _>(
                    name,
                    version.min(WL_SHM_VERSION),
                    qh,
                    (),
                ));
            }
            "wl_output" => {
                let bound = version.min(WL_OUTPUT_VERSION);
                let output = registry.bind::<wl_output::WlOutput, _, _>(name, bound, qh, ());
                let key = output.id().protocol_id();
                self.outputs.insert(key, Output::new(output, version));
            }
            "wl_seat" => {
                let bound = version.min(WL_SEAT_VERSION);
                let seat = registry.bind::<wl_seat::WlSeat, _, _>(name, bound, qh, ());
                let key = seat.id().protocol_id();
                self.seats.insert(key, Seat::new(seat, version));
            }
            _ => {}
        }

        let mut observers = std::mem::take(&mut self.observers);
        for observer in &mut observers {
            observer.global(registry, qh, name, interface, version);
        }
        self.observers = observers;
    }

    /// Fires any due key-repeat deadlines across all seats.
    pub(crate) fn service_repeats(&mut self) {
        let now = std::time::Instant::now();
        for seat in self.seats.values_mut() {
            if let Some(keyboard) = seat.keyboard_mut() {
                keyboard.service_repeat(now);
            }
        }
    }

    /// Milliseconds until the earliest key-repeat deadline, if any is armed.
    fn next_repeat_in_ms(&self) -> Option<u64> {
        let now = std::time::Instant::now();
        self.seats
            .values()
            .filter_map(|seat| seat.keyboard())
            .filter_map(|kb| kb.next_repeat_in_ms(now))
            .min()
    }
}

/// A connection to the Wayland display server.
///
/// Owns the registry, the bound singleton globals and the maps of discovered
/// [`Output`]s and [`Seat`]s. Dropping the display tears down every owned
/// protocol object.
pub struct Display {
    connection: Connection,
    event_queue: EventQueue<DisplayState>,
    qh: QueueHandle<DisplayState>,
    globals: GlobalList,
    compositor: wl_compositor::WlCompositor,
    state: DisplayState,
}

impl Display {
    /// Connects to the Wayland display and performs the discovery roundtrip.
    ///
    /// `name` selects a specific socket under `$XDG_RUNTIME_DIR`; `None`
    /// follows `$WAYLAND_DISPLAY`. Failure here is unrecoverable: callers are
    /// expected to let the error propagate and terminate.
    pub fn connect(name: Option<&str>, enable_cursor: bool) -> Result<Self, Error> {
        let connection = match name {
            Some(socket) => {
                let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR")
                    .map(PathBuf::from)
                    .ok_or_else(|| {
                        Error::Io(std::io::Error::new(
                            ErrorKind::NotFound,
                            "XDG_RUNTIME_DIR is not set",
                        ))
                    })?;
                let stream = UnixStream::connect(runtime_dir.join(socket))?;
                Connection::from_socket(stream)?
            }
            None => Connection::connect_to_env()?,
        };
        log::debug!("connected to wayland display");

        let (globals, mut event_queue) = registry_queue_init::<DisplayState>(&connection)?;
        let qh = event_queue.handle();

        let shared = Arc::new(SharedState::default());
        let mut state = DisplayState::new(enable_cursor, shared);

        let registry = globals.registry().clone();
        for global in globals.contents().clone_list() {
            state.handle_global(&registry, &qh, global.name, &global.interface, global.version);
        }

        // Deliver the initial property bursts (seat capabilities, output
        // geometry) before handing the display to the caller.
        event_queue.roundtrip(&mut state)?;

        let compositor = state
            .compositor
            .clone()
            .ok_or(Error::MissingGlobal("wl_compositor"))?;

        Ok(Self {
            connection,
            event_queue,
            qh,
            globals,
            compositor,
            state,
        })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Queue handle for creating protocol objects on the display's queue.
    pub fn queue_handle(&self) -> &QueueHandle<DisplayState> {
        &self.qh
    }

    /// The registry global list captured at connect time.
    pub fn globals(&self) -> &GlobalList {
        &self.globals
    }

    /// The bound `wl_compositor`.
    pub fn compositor(&self) -> &wl_compositor::WlCompositor {
        &self.compositor
    }

    /// Discovered outputs, keyed by protocol id.
    pub fn outputs(&self) -> &HashMap<u32, Output> {
        &self.state.outputs
    }

    /// Discovered seats, keyed by protocol id.
    pub fn seats(&self) -> &HashMap<u32, Seat> {
        &self.state.seats
    }

    /// Whether the compositor advertised `xrgb8888` shm support.
    pub fn has_xrgb(&self) -> bool {
        self.state.has_xrgb
    }

    /// Whether buffer scaling is usable (compositor version 3+).
    pub fn buffer_scaling_enabled(&self) -> bool {
        self.state.compositor_version >= 3
    }

    /// Registers an observer for globals advertised after connect.
    /// Observers run in registration order, after internal handling.
    pub fn add_registry_observer(&mut self, observer: Box<dyn RegistryObserver>) {
        self.state.observers.push(observer);
    }

    pub(crate) fn shared(&self) -> &Arc<SharedState> {
        &self.state.shared
    }

    /// Flushes requests and blocks until the server answers all of them.
    pub fn roundtrip(&mut self) -> Result<usize, Error> {
        Ok(self.event_queue.roundtrip(&mut self.state)?)
    }

    /// Flushes requests, blocks for new events and dispatches them.
    pub fn blocking_dispatch(&mut self) -> Result<usize, Error> {
        Ok(self.event_queue.blocking_dispatch(&mut self.state)?)
    }

    /// Fires due key-repeat timers. Called by the window manager before
    /// every dispatch pass.
    pub(crate) fn service_repeats(&mut self) {
        self.state.service_repeats();
    }

    /// Dispatches pending events, multiplexing socket readiness with the
    /// in-process queue via the prepare-read/flush/poll/read protocol.
    ///
    /// Poll timeout and absent readiness mean "no events" and return the
    /// count dispatched so far; only genuine I/O failures are errors.
    pub fn dispatch(&mut self, timeout_ms: i32) -> Result<usize, Error> {
        let mut count = self.event_queue.dispatch_pending(&mut self.state)?;

        let guard = loop {
            match self.event_queue.prepare_read() {
                Some(guard) => break guard,
                None => count += self.event_queue.dispatch_pending(&mut self.state)?,
            }
        };

        match self.connection.flush() {
            Ok(()) => {}
            Err(WaylandError::Io(ref err)) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => return Err(err.into()),
        }

        // Shorten the wait so key repeats fire on time.
        let timeout_ms = crate::seat::keyboard::clamp_timeout(
            timeout_ms,
            self.state.next_repeat_in_ms(),
        );

        let mut pollfd = libc::pollfd {
            fd: guard.connection_fd().as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pollfd, 1, timeout_ms) };
        match poll_outcome(ret, pollfd.revents) {
            PollOutcome::Readable => {
                match guard.read() {
                    Ok(_) => {}
                    Err(WaylandError::Io(ref err)) if err.kind() == ErrorKind::WouldBlock => {}
                    Err(err) => return Err(err.into()),
                }
                count += self.event_queue.dispatch_pending(&mut self.state)?;
                Ok(count)
            }
            // Dropping the guard cancels the pending read.
            PollOutcome::NoEvents => Ok(count),
            PollOutcome::Failed => Err(Error::Io(std::io::Error::last_os_error())),
        }
    }

    /// Reads and dispatches whatever is immediately available, without
    /// waiting for socket readiness.
    pub fn poll_events(&mut self) -> Result<usize, Error> {
        let mut count = 0;
        let guard = loop {
            match self.event_queue.prepare_read() {
                Some(guard) => break guard,
                None => count += self.event_queue.dispatch_pending(&mut self.state)?,
            }
        };

        match self.connection.flush() {
            Ok(()) => {}
            Err(WaylandError::Io(ref err)) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => return Err(err.into()),
        }

        match guard.read() {
            Ok(_) => {}
            Err(WaylandError::Io(ref err)) if err.kind() == ErrorKind::WouldBlock => {}
            Err(err) => return Err(err.into()),
        }
        count += self.event_queue.dispatch_pending(&mut self.state)?;
        Ok(count)
    }
}

/// How one `poll` on the connection fd resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    /// The socket has readable data.
    Readable,
    /// Timeout, or readiness without `POLLIN`. Nothing to report.
    NoEvents,
    /// The poll call itself failed.
    Failed,
}

/// Maps a `poll` return value and revents bits to an outcome. Timeouts and
/// absent read readiness are "no events", never errors.
pub(crate) fn poll_outcome(ret: i32, revents: i16) -> PollOutcome {
    if ret < 0 {
        PollOutcome::Failed
    } else if ret > 0 && revents & libc::POLLIN != 0 {
        PollOutcome::Readable
    } else {
        PollOutcome::NoEvents
    }
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for DisplayState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } => {
                log::debug!("registry advertised {interface} v{version} (name {name})");
                state.handle_global(registry, qh, name, &interface, version);
            }
            wl_registry::Event::GlobalRemove { name } => {
                log::debug!("registry removed global {name}");
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_compositor::WlCompositor, ()> for DisplayState {
    fn event(
        _state: &mut Self,
        _compositor: &wl_compositor::WlCompositor,
        _event: wl_compositor::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        // wl_compositor emits no events.
    }
}

impl Dispatch<wl_subcompositor::WlSubcompositor, ()> for DisplayState {
    fn event(
        _state: &mut Self,
        _subcompositor: &wl_subcompositor::WlSubcompositor,
        _event: wl_subcompositor::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        // wl_subcompositor emits no events.
    }
}

impl Dispatch<wl_shm::WlShm, ()> for DisplayState {
    fn event(
        state: &mut Self,
        _shm: &wl_shm::WlShm,
        event: wl_shm::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_shm::Event::Format { format } = event {
            if matches!(format.into_result(), Ok(wl_shm::Format::Xrgb8888)) {
                state.has_xrgb = true;
            }
        }
    }
}

impl Dispatch<wl_surface::WlSurface, ()> for DisplayState {
    fn event(
        _state: &mut Self,
        surface: &wl_surface::WlSurface,
        event: wl_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_surface::Event::Enter { .. } => {
                log::trace!("surface {} entered an output", surface.id().protocol_id());
            }
            wl_surface::Event::Leave { .. } => {
                log::trace!("surface {} left an output", surface.id().protocol_id());
            }
            _ => {}
        }
    }
}

impl Dispatch<wl_callback::WlCallback, u32> for DisplayState {
    fn event(
        state: &mut Self,
        callback: &wl_callback::WlCallback,
        event: wl_callback::Event,
        window_key: &u32,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_callback::Event::Done { callback_data } = event {
            if let Some(window) = state.shared.window(*window_key) {
                window.handle_frame_done(callback, callback_data);
            } else {
                log::trace!("frame callback fired for dropped window {window_key}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{poll_outcome, PollOutcome};

    #[test]
    fn poll_timeout_is_no_events() {
        assert_eq!(poll_outcome(0, 0), PollOutcome::NoEvents);
    }

    #[test]
    fn readiness_without_pollin_is_no_events() {
        assert_eq!(poll_outcome(1, libc::POLLOUT), PollOutcome::NoEvents);
        assert_eq!(poll_outcome(1, libc::POLLHUP), PollOutcome::NoEvents);
    }

    #[test]
    fn pollin_readiness_reads() {
        assert_eq!(poll_outcome(1, libc::POLLIN), PollOutcome::Readable);
    }

    #[test]
    fn negative_poll_return_is_a_failure() {
        assert_eq!(poll_outcome(-1, 0), PollOutcome::Failed);
    }
}
