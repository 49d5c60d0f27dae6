// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! An in-process host that executes EGL calls straight out of the transport buffer, plus fake
//! GLES clients and native drawables.

#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use sync::Mutex;
use sync::Promise;
use yagl::backend::Backend;
use yagl::client::ClientApi;
use yagl::client::ClientContext;
use yagl::client::ClientImage;
use yagl::client::ClientInterface;
use yagl::client::ClientInterfaces;
use yagl::client::TexImageBinding;
use yagl::config::TransportConfig;
use yagl::config::DEFAULT_MAX_BUFF_SIZE;
use yagl::config::DEFAULT_MAX_CALL_SIZE;
use yagl::display::Display;
use yagl::egl::defs::EGL_CONTEXT_CLIENT_VERSION;
use yagl::egl::defs::EGL_HEIGHT;
use yagl::egl::defs::EGL_NONE;
use yagl::egl::defs::EGL_WIDTH;
use yagl::fence::promise_fence;
use yagl::fence::Fence;
use yagl::fence::FenceSequence;
use yagl::host_egl::EglFunc;
use yagl::host_egl::OffscreenBuffer;
use yagl::image::Image;
use yagl::native::DisplayCaps;
use yagl::native::NativeDisplay;
use yagl::native::NativeDrawable;
use yagl::native::NativeImage;
use yagl::offscreen::OffscreenBackend;
use yagl::resource::ClientHandle;
use yagl::resource::HostHandle;
use yagl::runtime::Connection;
use yagl::runtime::Connector;
use yagl::runtime::GlVersion;
use yagl::runtime::MemoryPin;
use yagl::runtime::RenderType;
use yagl::runtime::Runtime;
use yagl::runtime::UserInfo;
use yagl::surface::Surface;
use yagl::transport::padded;
use yagl::transport::read_slot;
use yagl::transport::write_slot;
use yagl::transport::ApiId;
use yagl::transport::Header;
use yagl::transport::HostChannel;
use yagl::transport::Scalar;
use yagl::transport::HEADER_RESULT;
use yagl::transport::HEADER_SIZE;
use yagl::transport::RESULT_OK;
use yagl::transport::SLOT_SIZE;
use yagl::Egl;

pub const CONFIG: HostHandle = 1;
pub const CONFIGS: [HostHandle; 3] = [1, 2, 3];
/// Written by the host into the first pixel of a surface on every swap or copy.
pub const RENDERED: u8 = 0xab;
/// Value the host reports for attributes it is asked about.
pub const HOST_ATTRIB: i32 = 0x55;

const EGL_SUCCESS: i32 = 0x3000;
const EGL_BAD_DISPLAY: i32 = 0x3008;
const EGL_BAD_SURFACE: i32 = 0x300D;
const EGL_BAD_CONTEXT: i32 = 0x3006;

#[derive(Default)]
pub struct HostState {
    pub calls: Vec<EglFunc>,
    next_handle: u32,
    pub displays: HashMap<u64, HostHandle>,
    pub initialized: HashSet<HostHandle>,
    pub surfaces: HashMap<HostHandle, OffscreenBuffer>,
    pub contexts: HashSet<HostHandle>,
    pub current: Option<(HostHandle, HostHandle, HostHandle, HostHandle)>,
    pub api: u32,
    pub images: Vec<u32>,
    pub attribs: Vec<i32>,
    /// Makes the next call to the function fail with the error code.
    pub fail: Option<(EglFunc, i32)>,
    pub fences: HashMap<u32, Promise>,
    /// Hands out this sequence number for every new fence when set.
    pub fixed_fence_seq: Option<u32>,
    pub signaled: Vec<u32>,
    pub pinned: Vec<(usize, usize)>,
    pub connections: usize,
}

impl HostState {
    fn new_handle(&mut self) -> HostHandle {
        self.next_handle += 1;
        0x100 + self.next_handle
    }

    pub fn count(&self, func: EglFunc) -> usize {
        self.calls.iter().filter(|&&f| f == func).count()
    }

    /// The only surface the host knows about.
    pub fn single_surface(&self) -> (HostHandle, OffscreenBuffer) {
        assert_eq!(self.surfaces.len(), 1);
        let (&handle, &buffer) = self.surfaces.iter().next().unwrap();
        (handle, buffer)
    }
}

pub type SharedHost = Arc<Mutex<HostState>>;

/// Reads the arguments of one call and writes its results in place.
struct Cursor<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn out<T: Scalar>(&mut self) -> T {
        let value = read_slot(self.buf, self.pos);
        self.pos += SLOT_SIZE;
        value
    }

    /// Skips a by-reference argument, returning where its value goes.
    fn in_arg(&mut self) -> Option<usize> {
        let addr: u64 = self.out();
        if addr == 0 {
            return None;
        }
        let offset = self.pos;
        self.pos += SLOT_SIZE;
        Some(offset)
    }

    fn out_array(&mut self) -> Vec<i32> {
        let addr: u64 = self.out();
        let count: i32 = self.out();
        if addr == 0 || count <= 0 {
            return Vec::new();
        }
        let len = count as usize * 4;
        let values = self.buf[self.pos..self.pos + len]
            .chunks_exact(4)
            .map(|bytes| i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();
        self.pos += padded(len);
        values
    }

    /// Writes as many of `values` as fit into an output array. Returns how many were written,
    /// `None` without an array.
    fn in_array(&mut self, values: &[u32]) -> Option<usize> {
        let addr: u64 = self.out();
        let count_offset = self.pos;
        let maxcount: i32 = self.out();
        let data_offset = self.pos;
        if addr == 0 {
            return None;
        }
        if maxcount <= 0 {
            return Some(0);
        }
        let count = values.len().min(maxcount as usize);
        for (i, value) in values[..count].iter().enumerate() {
            let offset = data_offset + i * 4;
            self.buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
        }
        write_slot(self.buf, count_offset, count as i32);
        self.pos += padded(maxcount as usize * 4);
        Some(count)
    }

    fn set<T: Scalar>(&mut self, offset: Option<usize>, value: T) {
        if let Some(offset) = offset {
            write_slot(self.buf, offset, value);
        }
    }

    /// Reads the trailing error and return value slots and fills them.
    fn finish(&mut self, result: Result<u32, i32>) {
        let error = self.in_arg();
        let ret = self.in_arg();
        match result {
            Ok(ret_value) => {
                self.set(error, EGL_SUCCESS);
                self.set(ret, ret_value);
            }
            Err(code) => {
                self.set(error, code);
                self.set(ret, 0u32);
            }
        }
    }

    fn buffer(&mut self) -> OffscreenBuffer {
        OffscreenBuffer {
            width: self.out(),
            height: self.out(),
            bpp: self.out(),
            pixels: self.out(),
        }
    }
}

fn render(buffer: &OffscreenBuffer) {
    let len = buffer.width as usize * buffer.height as usize * buffer.bpp as usize;
    if buffer.pixels == 0 || len == 0 {
        return;
    }
    // SAFETY: the surface keeps its backing buffer pinned and alive while the host knows it.
    unsafe {
        *(buffer.pixels as *mut u8) = RENDERED;
    }
}

pub struct FakeChannel {
    buf: Vec<u8>,
    host: SharedHost,
}

impl FakeChannel {
    fn execute(&mut self) {
        let header = Header::read(&self.buf);
        let end = HEADER_SIZE + header.batch_size as usize;
        let mut host = self.host.lock();
        let mut c = Cursor {
            buf: &mut self.buf,
            pos: HEADER_SIZE,
        };
        while c.pos < end {
            let api: u32 = c.out();
            let func: u32 = c.out();
            let _direct: u32 = c.out();
            assert_eq!(api, ApiId::Egl as u32);
            let func = EglFunc::n(func).expect("unknown EGL function");
            host.calls.push(func);
            let fail = match host.fail {
                Some((f, code)) if f == func => {
                    host.fail = None;
                    Some(code)
                }
                _ => None,
            };
            execute_call(&mut host, &mut c, func, fail);
        }
        // The batch has run. A later sync commit must not run it again.
        write_slot(&mut self.buf, yagl::transport::HEADER_BATCH_SIZE, 0u32);

        if header.fence_seq != 0 {
            if let Some(promise) = host.fences.remove(&header.fence_seq) {
                promise.signal();
            }
            host.signaled.push(header.fence_seq);
        }
    }
}

fn execute_call(host: &mut HostState, c: &mut Cursor, func: EglFunc, fail: Option<i32>) {
    let check = |result: Result<u32, i32>| match fail {
        Some(code) => Err(code),
        None => result,
    };
    match func {
        EglFunc::GetDisplay => {
            let display_id: u64 = c.out();
            let handle = match host.displays.get(&display_id) {
                Some(&handle) => handle,
                None => {
                    let handle = host.new_handle();
                    host.displays.insert(display_id, handle);
                    handle
                }
            };
            c.finish(check(Ok(handle)));
        }
        EglFunc::Initialize => {
            let dpy: HostHandle = c.out();
            let major = c.in_arg();
            let minor = c.in_arg();
            let known = host.displays.values().any(|&d| d == dpy);
            let result = check(if known { Ok(1) } else { Err(EGL_BAD_DISPLAY) });
            if result.is_ok() {
                host.initialized.insert(dpy);
                c.set(major, 1i32);
                c.set(minor, 4i32);
            }
            c.finish(result);
        }
        EglFunc::Terminate => {
            let dpy: HostHandle = c.out();
            host.initialized.remove(&dpy);
            c.finish(check(Ok(1)));
        }
        EglFunc::GetConfigs => {
            let _dpy: HostHandle = c.out();
            let written = c.in_array(&CONFIGS);
            let num_config = c.in_arg();
            c.set(num_config, written.unwrap_or(CONFIGS.len()) as i32);
            c.finish(check(Ok(1)));
        }
        EglFunc::ChooseConfig => {
            let _dpy: HostHandle = c.out();
            host.attribs = c.out_array();
            let written = c.in_array(&CONFIGS[..1]);
            let num_config = c.in_arg();
            c.set(num_config, written.unwrap_or(1) as i32);
            c.finish(check(Ok(1)));
        }
        EglFunc::GetConfigAttrib | EglFunc::QuerySurface => {
            let _dpy: HostHandle = c.out();
            let object: HostHandle = c.out();
            let attribute: i32 = c.out();
            let value = c.in_arg();
            let answer = match (func, host.surfaces.get(&object)) {
                (EglFunc::QuerySurface, Some(buffer)) if attribute == EGL_WIDTH => {
                    buffer.width as i32
                }
                (EglFunc::QuerySurface, Some(buffer)) if attribute == EGL_HEIGHT => {
                    buffer.height as i32
                }
                (EglFunc::QuerySurface, None) => {
                    c.finish(Err(EGL_BAD_SURFACE));
                    return;
                }
                _ => HOST_ATTRIB,
            };
            c.set(value, answer);
            c.finish(check(Ok(1)));
        }
        EglFunc::DestroySurface => {
            let _dpy: HostHandle = c.out();
            let surface: HostHandle = c.out();
            let result = match host.surfaces.remove(&surface) {
                Some(_) => Ok(1),
                None => Err(EGL_BAD_SURFACE),
            };
            c.finish(check(result));
        }
        EglFunc::BindApi => {
            host.api = c.out();
        }
        EglFunc::WaitClient => {}
        EglFunc::ReleaseThread => {
            host.current = None;
            c.finish(check(Ok(1)));
        }
        EglFunc::SurfaceAttrib => {
            let _dpy: HostHandle = c.out();
            let _surface: HostHandle = c.out();
            let _attribute: i32 = c.out();
            let _value: i32 = c.out();
            c.finish(check(Ok(1)));
        }
        EglFunc::CreateContext => {
            let _dpy: HostHandle = c.out();
            let _config: HostHandle = c.out();
            let _share: HostHandle = c.out();
            host.attribs = c.out_array();
            let result = check(Ok(0));
            let result = result.map(|_| {
                let handle = host.new_handle();
                host.contexts.insert(handle);
                handle
            });
            c.finish(result);
        }
        EglFunc::DestroyContext => {
            let _dpy: HostHandle = c.out();
            let context: HostHandle = c.out();
            let result = if host.contexts.remove(&context) {
                Ok(1)
            } else {
                Err(EGL_BAD_CONTEXT)
            };
            c.finish(check(result));
        }
        EglFunc::MakeCurrent => {
            let dpy: HostHandle = c.out();
            let draw: HostHandle = c.out();
            let read: HostHandle = c.out();
            let context: HostHandle = c.out();
            host.current = Some((dpy, draw, read, context));
        }
        EglFunc::QueryContext => {
            let _dpy: HostHandle = c.out();
            let _context: HostHandle = c.out();
            let _attribute: i32 = c.out();
            let value = c.in_arg();
            c.set(value, HOST_ATTRIB);
            c.finish(check(Ok(1)));
        }
        EglFunc::SwapBuffers | EglFunc::CopyBuffers => {
            let _dpy: HostHandle = c.out();
            let surface: HostHandle = c.out();
            if let Some(buffer) = host.surfaces.get(&surface) {
                render(buffer);
            }
        }
        EglFunc::CreateWindowSurfaceOffscreen
        | EglFunc::CreatePixmapSurfaceOffscreen
        | EglFunc::CreatePbufferSurfaceOffscreen => {
            let _dpy: HostHandle = c.out();
            let _config: HostHandle = c.out();
            let buffer = c.buffer();
            host.attribs = c.out_array();
            let result = check(Ok(0)).map(|_| {
                let handle = host.new_handle();
                host.surfaces.insert(handle, buffer);
                handle
            });
            c.finish(result);
        }
        EglFunc::ResizeOffscreenSurface => {
            let _dpy: HostHandle = c.out();
            let surface: HostHandle = c.out();
            let buffer = c.buffer();
            let result = match host.surfaces.get_mut(&surface) {
                Some(old) => {
                    *old = buffer;
                    Ok(1)
                }
                None => Err(EGL_BAD_SURFACE),
            };
            c.finish(check(result));
        }
        EglFunc::CreateImage => {
            let name: u32 = c.out();
            let _dpy: HostHandle = c.out();
            let _buffer: u64 = c.out();
            let result = check(Ok(1));
            if result.is_ok() {
                host.images.push(name);
            }
            c.finish(result);
        }
    }
}

impl HostChannel for FakeChannel {
    fn resize(&mut self, size: usize) -> yagl::Result<()> {
        self.buf.resize(size, 0);
        Ok(())
    }

    fn buffer(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    fn commit(&mut self, sync: bool) {
        // A sync commit only drains work that was already submitted.
        if !sync {
            self.execute();
        }
        write_slot(&mut self.buf, HEADER_RESULT, RESULT_OK);
    }
}

pub struct FakePinner {
    host: SharedHost,
}

impl MemoryPin for FakePinner {
    fn lock(&self, data: &[u8]) -> yagl::Result<()> {
        self.host
            .lock()
            .pinned
            .push((data.as_ptr() as usize, data.len()));
        Ok(())
    }

    fn unlock(&self, data: &[u8]) -> yagl::Result<()> {
        let range = (data.as_ptr() as usize, data.len());
        let mut host = self.host.lock();
        let index = host
            .pinned
            .iter()
            .position(|&pinned| pinned == range)
            .expect("unlocking memory that was never locked");
        host.pinned.remove(index);
        Ok(())
    }
}

pub struct FakeConnector {
    host: SharedHost,
    gl_version: GlVersion,
}

impl Connector for FakeConnector {
    fn connect(&self) -> yagl::Result<Connection> {
        let mut host = self.host.lock();
        host.connections += 1;
        Ok(Connection {
            channel: Box::new(FakeChannel {
                buf: Vec::new(),
                host: self.host.clone(),
            }),
            pinner: Arc::new(FakePinner {
                host: self.host.clone(),
            }),
            info: UserInfo {
                index: host.connections as u32,
                render_type: RenderType::Offscreen,
                gl_version: self.gl_version,
            },
        })
    }
}

#[derive(Default)]
pub struct ClientState {
    /// API and whether a share context was given, per created context.
    pub contexts: Vec<(ClientApi, bool)>,
    pub prepared: usize,
    pub images: Vec<u32>,
    /// (width, height, bpp, bytes) per image update.
    pub updates: Vec<(u32, u32, u32, usize)>,
    pub bound: Vec<u64>,
    pub released: Vec<u64>,
    next_cookie: u64,
}

pub type SharedClient = Arc<Mutex<ClientState>>;

pub struct FakeClient {
    state: SharedClient,
}

struct FakeClientContext {
    api: ClientApi,
    state: SharedClient,
}

struct FakeClientImage {
    state: SharedClient,
}

impl ClientInterface for FakeClient {
    fn create_ctx(
        &self,
        api: ClientApi,
        share: Option<&dyn ClientContext>,
    ) -> Box<dyn ClientContext> {
        self.state.lock().contexts.push((api, share.is_some()));
        Box::new(FakeClientContext {
            api,
            state: self.state.clone(),
        })
    }

    fn create_image(&self, tex_global_name: u32) -> Arc<dyn ClientImage> {
        self.state.lock().images.push(tex_global_name);
        Arc::new(FakeClientImage {
            state: self.state.clone(),
        })
    }

    fn release_tex_image(&self, cookie: u64) {
        self.state.lock().released.push(cookie);
    }
}

impl ClientContext for FakeClientContext {
    fn api(&self) -> ClientApi {
        self.api
    }

    fn prepare(&self) {
        self.state.lock().prepared += 1;
    }

    fn bind_tex_image(
        &self,
        _image: &Arc<dyn ClientImage>,
        _binding: TexImageBinding,
    ) -> Option<u64> {
        let mut state = self.state.lock();
        state.next_cookie += 1;
        let cookie = state.next_cookie;
        state.bound.push(cookie);
        Some(cookie)
    }
}

impl ClientImage for FakeClientImage {
    fn update(&self, width: u32, height: u32, bpp: u32, pixels: &[u8]) {
        self.state
            .lock()
            .updates
            .push((width, height, bpp, pixels.len()));
    }
}

pub struct FakeDisplay {
    pub id: u64,
    pub caps: DisplayCaps,
}

impl NativeDisplay for FakeDisplay {
    fn id(&self) -> u64 {
        self.id
    }

    fn caps(&self) -> DisplayCaps {
        self.caps
    }
}

/// A window or pixmap. Clones share their state, so a test keeps one to look at what the
/// runtime did with the other.
#[derive(Clone)]
pub struct FakeDrawable {
    id: u64,
    geometry: Arc<Mutex<(u32, u32, u32)>>,
    /// (width, height, first byte) per presented image.
    pub presented: Arc<Mutex<Vec<(u32, u32, u8)>>>,
    pub intervals: Arc<Mutex<Vec<i32>>>,
}

impl FakeDrawable {
    pub fn new(id: u64, width: u32, height: u32) -> FakeDrawable {
        FakeDrawable {
            id,
            geometry: Arc::new(Mutex::new((width, height, 24))),
            presented: Arc::new(Mutex::new(Vec::new())),
            intervals: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn resize(&self, width: u32, height: u32) {
        let mut geometry = self.geometry.lock();
        geometry.0 = width;
        geometry.1 = height;
    }

    pub fn boxed(&self) -> Box<dyn NativeDrawable> {
        Box::new(self.clone())
    }
}

impl NativeDrawable for FakeDrawable {
    fn id(&self) -> u64 {
        self.id
    }

    fn geometry(&self) -> (u32, u32, u32) {
        *self.geometry.lock()
    }

    fn present(&self, image: &NativeImage) {
        self.presented.lock().push((
            image.width(),
            image.height(),
            image.pixels().first().copied().unwrap_or(0),
        ));
    }

    fn read_pixels(&self, width: u32, height: u32) -> Option<NativeImage> {
        let mut image = NativeImage::new(width, height, 24)?;
        image.pixels_mut().fill(7);
        Some(image)
    }

    fn buffer_age(&self) -> i32 {
        2
    }

    fn set_swap_interval(&self, interval: i32) {
        self.intervals.lock().push(interval);
    }
}

/// The offscreen backend with fences the fake host signals.
pub struct FencingBackend {
    host: SharedHost,
    seq: FenceSequence,
}

impl Backend for FencingBackend {
    fn create_window_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        window: Box<dyn NativeDrawable>,
        attribs: &[i32],
    ) -> yagl::EglResult<Arc<Surface>> {
        OffscreenBackend.create_window_surface(rt, display, config, window, attribs)
    }

    fn create_pixmap_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        pixmap: Box<dyn NativeDrawable>,
        attribs: &[i32],
    ) -> yagl::EglResult<Arc<Surface>> {
        OffscreenBackend.create_pixmap_surface(rt, display, config, pixmap, attribs)
    }

    fn create_pbuffer_surface(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        config: HostHandle,
        attribs: &[i32],
    ) -> yagl::EglResult<Arc<Surface>> {
        OffscreenBackend.create_pbuffer_surface(rt, display, config, attribs)
    }

    fn create_image_pixmap(
        &self,
        rt: &Runtime,
        display: &Arc<Display>,
        pixmap: Box<dyn NativeDrawable>,
        iface: &dyn ClientInterface,
    ) -> yagl::EglResult<Arc<Image>> {
        OffscreenBackend.create_image_pixmap(rt, display, pixmap, iface)
    }

    fn create_fence(&self, display: &Arc<Display>) -> Option<Arc<Fence>> {
        let seq = self.host.lock().fixed_fence_seq;
        let seq = seq.unwrap_or_else(|| self.seq.next());
        let (fence, promise) = promise_fence(seq, display);
        self.host.lock().fences.insert(fence.seq(), promise);
        Some(fence)
    }

    fn fence_supported(&self) -> bool {
        true
    }

    fn y_inverted(&self) -> bool {
        true
    }
}

pub struct Harness {
    pub egl: Egl,
    pub host: SharedHost,
    pub client: SharedClient,
}

fn transport_config() -> TransportConfig {
    TransportConfig {
        max_buff_size: DEFAULT_MAX_BUFF_SIZE,
        max_call_size: DEFAULT_MAX_CALL_SIZE,
    }
}

fn build(gl_version: GlVersion, fencing: bool) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();

    let host: SharedHost = Arc::new(Mutex::new(HostState::default()));
    let client: SharedClient = Arc::new(Mutex::new(ClientState::default()));
    let iface: Arc<dyn ClientInterface> = Arc::new(FakeClient {
        state: client.clone(),
    });
    let clients = ClientInterfaces {
        gles1: Some(iface.clone()),
        gles2: Some(iface),
    };
    let connector = Box::new(FakeConnector {
        host: host.clone(),
        gl_version,
    });
    let rt = if fencing {
        let backend = Arc::new(FencingBackend {
            host: host.clone(),
            seq: FenceSequence::new(),
        });
        Runtime::with_backend(connector, clients, transport_config(), backend)
    } else {
        Runtime::new(connector, clients, transport_config())
    };
    let rt = rt.expect("failed to create runtime");

    Harness {
        egl: Egl::new(rt),
        host,
        client,
    }
}

/// A runtime on the offscreen backend, which has no fences.
pub fn harness(gl_version: GlVersion) -> Harness {
    build(gl_version, false)
}

pub fn fencing_harness() -> Harness {
    build(GlVersion::Gl31Es3, true)
}

impl Harness {
    /// Gets and initializes the display of a native display `id`.
    pub fn display(&self, id: u64, caps: DisplayCaps) -> HostHandle {
        let dpy = self
            .egl
            .get_display(&FakeDisplay { id, caps })
            .expect("get_display failed");
        self.egl.initialize(dpy).expect("initialize failed");
        dpy
    }

    pub fn pbuffer(&self, dpy: HostHandle, width: i32, height: i32) -> ClientHandle {
        self.egl
            .create_pbuffer_surface(dpy, CONFIG, &[EGL_WIDTH, width, EGL_HEIGHT, height, EGL_NONE])
            .expect("create_pbuffer_surface failed")
    }

    pub fn context(&self, dpy: HostHandle, version: i32) -> HostHandle {
        self.egl
            .create_context(dpy, CONFIG, 0, &[EGL_CONTEXT_CLIENT_VERSION, version, EGL_NONE])
            .expect("create_context failed")
    }

    pub fn pinned(&self) -> usize {
        self.host.lock().pinned.len()
    }
}
