// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The process-wide runtime and the per-thread device connections.
//!
//! A `Runtime` is built once from a `Connector`. The connection made while building it decides
//! the backend and the host GL version. Every other thread opens its own connection and
//! transport on first use, kept in a thread-local cell next to the EGL state.

use std::cell::RefCell;
use std::mem;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Once;

use anyhow::bail;
use anyhow::Context as _;
use enumn::N;
use log::info;
use log::warn;
use sync::Mutex;

use crate::backend::Backend;
use crate::client::ClientInterfaces;
use crate::config::TransportConfig;
use crate::context::Context;
use crate::display::DisplayTable;
use crate::egl_state;
use crate::error::Error;
use crate::fatal;
use crate::names::NameGenerator;
use crate::offscreen::OffscreenBackend;
use crate::transport::FenceRequest;
use crate::transport::FlushHook;
use crate::transport::HostChannel;
use crate::transport::Transport;

/// How the host renders, as reported by the device.
#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum RenderType {
    Offscreen = yagl_sys::YAGL_RENDER_TYPE_OFFSCREEN,
    Onscreen = yagl_sys::YAGL_RENDER_TYPE_ONSCREEN,
}

/// The host's OpenGL version, ordered from oldest to newest.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, N)]
#[repr(u32)]
pub enum GlVersion {
    Gl2 = yagl_sys::YAGL_GL_2,
    Gl31 = yagl_sys::YAGL_GL_3_1,
    Gl31Es3 = yagl_sys::YAGL_GL_3_1_ES3,
    Gl32 = yagl_sys::YAGL_GL_3_2,
}

/// What the device tells a new connection about itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UserInfo {
    pub index: u32,
    pub render_type: RenderType,
    pub gl_version: GlVersion,
}

impl UserInfo {
    /// Validates the raw values reported by the device.
    pub fn from_raw(info: yagl_sys::yagl_user_info) -> crate::Result<UserInfo> {
        Ok(UserInfo {
            index: info.index,
            render_type: RenderType::n(info.render_type)
                .ok_or(Error::BadRenderType(info.render_type))?,
            gl_version: GlVersion::n(info.gl_version)
                .ok_or(Error::BadGlVersion(info.gl_version))?,
        })
    }
}

/// Keeps guest memory resident while the host may access it.
pub trait MemoryPin: Send + Sync {
    fn lock(&self, data: &[u8]) -> crate::Result<()>;

    fn unlock(&self, data: &[u8]) -> crate::Result<()>;
}

/// One connection to the host.
pub struct Connection {
    pub channel: Box<dyn HostChannel>,
    pub pinner: Arc<dyn MemoryPin>,
    pub info: UserInfo,
}

/// Opens connections to the host, one per thread.
pub trait Connector: Send + Sync {
    fn connect(&self) -> crate::Result<Connection>;
}

static FORK_GENERATION: AtomicU64 = AtomicU64::new(0);
static FORK_HANDLER: Once = Once::new();
static NEXT_RUNTIME_ID: AtomicU64 = AtomicU64::new(1);

extern "C" fn on_fork_child() {
    FORK_GENERATION.fetch_add(1, Ordering::SeqCst);
}

/// Bumped in the child of every `fork`. State stamped with an older generation belongs to the
/// parent.
pub(crate) fn fork_generation() -> u64 {
    FORK_GENERATION.load(Ordering::SeqCst)
}

fn register_fork_handler() {
    FORK_HANDLER.call_once(|| {
        // SAFETY: `on_fork_child` only touches an atomic, which is async-signal-safe.
        let ret = unsafe { libc::pthread_atfork(None, None, Some(on_fork_child)) };
        if ret != 0 {
            warn!("pthread_atfork failed: {}", ret);
        }
    });
}

struct ThreadConnection {
    runtime_id: u64,
    generation: u64,
    transport: Transport,
}

thread_local! {
    static CONNECTION: RefCell<Option<ThreadConnection>> = const { RefCell::new(None) };
}

/// Decides which fence accompanies each committed batch and sets up throttling of the current
/// context.
struct RuntimeFlushHook {
    runtime_id: u64,
    backend: Arc<dyn Backend>,
    displays: Arc<DisplayTable>,
}

impl FlushHook for RuntimeFlushHook {
    fn flush(&mut self, request: FenceRequest<'_>) -> u32 {
        let context = egl_state::current_context_of(self.runtime_id);
        let throttled = context.as_ref().map_or(true, |ctx| ctx.needs_throttle());
        if throttled && matches!(request, FenceRequest::None) {
            return 0;
        }

        let fence = match &request {
            FenceRequest::Existing(fence) => Some(Arc::clone(fence)),
            _ => self
                .displays
                .fence_display()
                .and_then(|display| self.backend.create_fence(&display)),
        };

        // A caller that asked for a new fence waits on it, so there is nothing to throttle.
        if let Some(context) = &context {
            if !context.needs_throttle() && !matches!(request, FenceRequest::New(_)) {
                context.set_need_throttle(fence.clone());
            }
        }

        let seq = fence.as_ref().map_or(0, |fence| fence.seq());
        if let FenceRequest::New(out) = request {
            *out = fence;
        }
        seq
    }
}

pub struct Runtime {
    id: u64,
    connector: Box<dyn Connector>,
    config: TransportConfig,
    backend: Arc<dyn Backend>,
    gl_version: GlVersion,
    clients: ClientInterfaces,
    displays: Arc<DisplayTable>,
    names: NameGenerator,
    locations: NameGenerator,
    pinner: Mutex<Option<Arc<dyn MemoryPin>>>,
    generation: AtomicU64,
}

impl Runtime {
    /// Connects to the host and picks the backend matching its render type.
    pub fn new(
        connector: Box<dyn Connector>,
        clients: ClientInterfaces,
        config: TransportConfig,
    ) -> anyhow::Result<Arc<Runtime>> {
        Runtime::build(connector, clients, config, |info| match info.render_type {
            RenderType::Offscreen => Ok(Arc::new(OffscreenBackend) as Arc<dyn Backend>),
            RenderType::Onscreen => bail!("onscreen rendering is not supported"),
        })
    }

    /// Like `new`, with `backend` regardless of the render type.
    pub fn with_backend(
        connector: Box<dyn Connector>,
        clients: ClientInterfaces,
        config: TransportConfig,
        backend: Arc<dyn Backend>,
    ) -> anyhow::Result<Arc<Runtime>> {
        Runtime::build(connector, clients, config, |_| Ok(backend))
    }

    /// Opens `/dev/yagl` with limits from the environment.
    #[cfg(any(target_os = "android", target_os = "linux"))]
    pub fn from_env(clients: ClientInterfaces) -> anyhow::Result<Arc<Runtime>> {
        Runtime::new(
            Box::new(crate::sys::DeviceConnector::new()),
            clients,
            TransportConfig::from_env(),
        )
    }

    fn build<F>(
        connector: Box<dyn Connector>,
        clients: ClientInterfaces,
        config: TransportConfig,
        select_backend: F,
    ) -> anyhow::Result<Arc<Runtime>>
    where
        F: FnOnce(&UserInfo) -> anyhow::Result<Arc<dyn Backend>>,
    {
        register_fork_handler();

        let connection = match connector.connect() {
            // A device speaking another protocol can never be talked to.
            Err(e @ Error::VersionMismatch { .. }) => {
                fatal!("Unable to connect to the host: {}", e)
            }
            result => result.context("failed to connect to the host")?,
        };
        let info = connection.info;
        let backend = select_backend(&info)?;
        info!(
            "connected as user {}, render type {:?}, host GL {:?}",
            info.index, info.render_type, info.gl_version
        );

        let runtime = Arc::new(Runtime {
            id: NEXT_RUNTIME_ID.fetch_add(1, Ordering::Relaxed),
            connector,
            config: config.normalized(),
            backend,
            gl_version: info.gl_version,
            clients,
            displays: Arc::new(DisplayTable::new()),
            names: NameGenerator::new(),
            locations: NameGenerator::new(),
            pinner: Mutex::new(Some(connection.pinner)),
            generation: AtomicU64::new(fork_generation()),
        });

        let transport = runtime
            .create_transport(connection.channel)
            .context("failed to create the transport")?;
        let replaced = CONNECTION.with(|cell| {
            cell.replace(Some(ThreadConnection {
                runtime_id: runtime.id,
                generation: fork_generation(),
                transport,
            }))
        });
        drop(replaced);

        Ok(runtime)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn gl_version(&self) -> GlVersion {
        self.gl_version
    }

    pub fn clients(&self) -> &ClientInterfaces {
        &self.clients
    }

    pub fn displays(&self) -> &DisplayTable {
        self.check_fork();
        &self.displays
    }

    /// A new process-wide host object name.
    pub fn global_name(&self) -> u32 {
        self.names.next()
    }

    /// A new process-wide uniform or sampler location.
    pub fn location(&self) -> u32 {
        self.locations.next()
    }

    /// The device handle used to pin memory shared with the host.
    pub fn pinner(&self) -> Arc<dyn MemoryPin> {
        if let Some(pinner) = self.current_pinner() {
            return pinner;
        }
        // The first connection after a fork brings a new one.
        self.with_transport(|_| ());
        match self.current_pinner() {
            Some(pinner) => pinner,
            None => fatal!("no device connection to pin memory with"),
        }
    }

    fn current_pinner(&self) -> Option<Arc<dyn MemoryPin>> {
        self.check_fork();
        self.pinner.lock().clone()
    }

    /// Runs `f` on this thread's transport, connecting first if the thread has none yet.
    pub fn with_transport<R, F>(&self, f: F) -> R
    where
        F: FnOnce(&mut Transport) -> R,
    {
        self.check_fork();
        let generation = fork_generation();
        CONNECTION.with(|cell| {
            let mut slot = cell.borrow_mut();
            let is_stale = slot.as_ref().is_some_and(|connection| {
                connection.runtime_id != self.id || connection.generation != generation
            });
            if is_stale {
                if let Some(stale) = slot.take() {
                    if stale.generation != generation {
                        // The parent still owns the mapping and the device file.
                        mem::forget(stale);
                    }
                }
            }
            let connection = slot.get_or_insert_with(|| self.connect(generation));
            f(&mut connection.transport)
        })
    }

    fn connect(&self, generation: u64) -> ThreadConnection {
        let connection = match self.connector.connect() {
            Ok(connection) => connection,
            Err(e) => fatal!("Unable to connect to the host: {}", e),
        };
        self.pinner
            .lock()
            .get_or_insert_with(|| connection.pinner.clone());
        let transport = match self.create_transport(connection.channel) {
            Ok(transport) => transport,
            Err(e) => fatal!("Unable to create transport: {}", e),
        };
        ThreadConnection {
            runtime_id: self.id,
            generation,
            transport,
        }
    }

    fn create_transport(&self, channel: Box<dyn HostChannel>) -> crate::Result<Transport> {
        let hook = RuntimeFlushHook {
            runtime_id: self.id,
            backend: self.backend.clone(),
            displays: self.displays.clone(),
        };
        Transport::new(channel, Box::new(hook), self.config)
    }

    /// Drops, without destroying, everything the parent of a fork left behind.
    fn check_fork(&self) {
        let generation = fork_generation();
        if self.generation.swap(generation, Ordering::SeqCst) != generation {
            warn!("Forking after GL calls!");
            self.displays.forget_all();
            mem::forget(self.pinner.lock().take());
        }
    }

    /// The context current on this thread.
    pub fn current_context(&self) -> Option<Arc<Context>> {
        egl_state::context(self)
    }

    /// Called by the client layer before it renders. Throttles the current context when asked,
    /// then invalidates the current surfaces.
    pub fn render_invalidate(&self, throttle: bool) {
        let current = egl_state::current(self);
        if throttle {
            if let Some(context) = &current.context {
                context.throttle(|| self.with_transport(Transport::wait));
            }
        }
        if let Some(draw) = &current.draw {
            draw.invalidate(self);
        }
        if let Some(read) = &current.read {
            let same = current.draw.as_ref().is_some_and(|draw| Arc::ptr_eq(draw, read));
            if !same {
                read.invalidate(self);
            }
        }
    }

    /// Called by the client layer on `glFinish`.
    pub fn render_finish(&self) {
        if let Some(draw) = egl_state::draw_surface(self) {
            draw.wait_gl(self);
        }
    }
}
