// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The EGL entry points.
//!
//! Every entry point returns its result and, on failure, also records the error as the thread's
//! sticky EGL error, so a C shim can map `Err` to the EGL failure value and leave the code for
//! `eglGetError`.

pub mod defs;

use std::sync::Arc;

use log::debug;
use log::error;
use log::warn;

use self::defs::*;
use crate::client::ClientApi;
use crate::client::TexImageBinding;
use crate::context::Context;
use crate::display::Display;
use crate::egl_state;
use crate::error::EglError;
use crate::error::EglResult;
use crate::fence::Fence;
use crate::host_egl;
use crate::image::Image;
use crate::native::NativeDisplay;
use crate::native::NativeDrawable;
use crate::resource::ClientHandle;
use crate::resource::HostHandle;
use crate::runtime::GlVersion;
use crate::runtime::Runtime;
use crate::surface::Surface;
use crate::surface::SurfaceType;
use crate::transport::Transport;

/// An `EGLSyncKHR`: the sequence number of its fence.
pub type SyncHandle = u32;

/// What an `EGLImageKHR` is created from, one variant per supported target.
pub enum ImageSource {
    /// `EGL_NATIVE_PIXMAP_KHR`
    Pixmap(Box<dyn NativeDrawable>),
    /// `EGL_WAYLAND_BUFFER_WL`, a `wl_buffer` resource.
    WaylandBuffer(u64),
    /// `EGL_GL_TEXTURE_2D_KHR`, a texture name of the given context.
    GlTexture2D(u32),
    /// Any other target.
    Unsupported(u32),
}

impl ImageSource {
    pub fn target(&self) -> u32 {
        match self {
            ImageSource::Pixmap(_) => EGL_NATIVE_PIXMAP_KHR,
            ImageSource::WaylandBuffer(_) => EGL_WAYLAND_BUFFER_WL,
            ImageSource::GlTexture2D(_) => EGL_GL_TEXTURE_2D_KHR,
            ImageSource::Unsupported(target) => *target,
        }
    }
}

/// Iterates the (name, value) pairs of an attribute list up to `EGL_NONE`.
pub(crate) fn attrib_pairs(attribs: &[i32]) -> impl Iterator<Item = (i32, i32)> + '_ {
    attribs
        .chunks_exact(2)
        .map(|pair| (pair[0], pair[1]))
        .take_while(|&(name, _)| name != EGL_NONE)
}

/// Copies an attribute list up to its `EGL_NONE`, terminating the copy.
fn attrib_list(attribs: &[i32]) -> Vec<i32> {
    let mut list: Vec<i32> = attrib_pairs(attribs)
        .flat_map(|(name, value)| [name, value])
        .collect();
    list.push(EGL_NONE);
    list
}

/// Fails with `EGL_BAD_ATTRIBUTE` if `attribs` names anything outside `allowed`.
fn check_attribs(attribs: &[i32], allowed: &[i32]) -> EglResult<()> {
    if attrib_pairs(attribs).all(|(name, _)| allowed.contains(&name)) {
        Ok(())
    } else {
        Err(EglError::BadAttribute)
    }
}

/// The client API a context is created for: GLES 1 unless `EGL_CONTEXT_CLIENT_VERSION` says
/// otherwise.
fn client_api(api: u32, attribs: &[i32]) -> Option<ClientApi> {
    if api != EGL_OPENGL_ES_API {
        return None;
    }
    let mut client_api = ClientApi::Gles1;
    for (name, value) in attrib_pairs(attribs) {
        match name {
            EGL_CONTEXT_CLIENT_VERSION => client_api = ClientApi::from_version(value)?,
            _ => return None,
        }
    }
    Some(client_api)
}

fn same<T>(a: Option<&Arc<T>>, b: Option<&Arc<T>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// Handle to the EGL implementation of a runtime.
#[derive(Clone)]
pub struct Egl {
    rt: Arc<Runtime>,
}

impl Egl {
    pub fn new(rt: Arc<Runtime>) -> Egl {
        Egl { rt }
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.rt
    }

    /// Runs `f`, recording its error as the sticky error.
    fn call<T, F>(&self, f: F) -> EglResult<T>
    where
        F: FnOnce() -> EglResult<T>,
    {
        let result = f();
        if let Err(e) = &result {
            egl_state::set_error(&self.rt, *e);
        }
        result
    }

    /// Looks up an initialized display.
    fn display(&self, dpy: HostHandle) -> EglResult<Arc<Display>> {
        let display = self
            .rt
            .displays()
            .get(dpy)
            .ok_or(EglError::BadDisplay)?;
        if !display.is_prepared() {
            return Err(EglError::NotInitialized);
        }
        Ok(display)
    }

    fn surface(&self, display: &Display, handle: ClientHandle) -> EglResult<Arc<Surface>> {
        display.surface(handle).ok_or(EglError::BadSurface)
    }

    fn context(&self, display: &Display, handle: HostHandle) -> EglResult<Arc<Context>> {
        display.context(handle).ok_or(EglError::BadContext)
    }

    fn fence(&self, display: &Display, sync: SyncHandle) -> EglResult<Arc<Fence>> {
        display.fence(sync).ok_or(EglError::BadParameter)
    }

    /// Returns and clears the thread's error, as an EGL error code.
    pub fn get_error(&self) -> i32 {
        egl_state::get_error(&self.rt).code()
    }

    /// Returns the `EGLDisplay` of `native`, creating it on first use.
    pub fn get_display(&self, native: &dyn NativeDisplay) -> EglResult<HostHandle> {
        self.call(|| {
            let rt = &self.rt;
            let display_id = native.id();
            let display = rt
                .displays()
                .add(display_id, || {
                    let host_display =
                        rt.with_transport(|t| host_egl::get_display(t, display_id))?;
                    Ok(rt.backend().create_display(native, host_display))
                })
                .map_err(|e| {
                    error!("unable to add display {:#x}: {}", display_id, e);
                    EglError::BadDisplay
                })?;
            Ok(display.host_handle())
        })
    }

    /// Initializes `dpy`, returning the EGL version.
    pub fn initialize(&self, dpy: HostHandle) -> EglResult<(i32, i32)> {
        self.call(|| {
            let display = self.rt.displays().get(dpy).ok_or(EglError::BadDisplay)?;
            let version = self
                .rt
                .with_transport(|t| host_egl::initialize(t, display.host_handle()))?;
            display.prepare();
            Ok(version)
        })
    }

    pub fn terminate(&self, dpy: HostHandle) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            self.rt
                .with_transport(|t| host_egl::terminate(t, display.host_handle()))?;
            let detached = display.terminate();
            debug!(
                "terminated display {}: {} surfaces, {} contexts, {} images, {} fences",
                dpy,
                detached.surfaces.len(),
                detached.contexts.len(),
                detached.images.len(),
                detached.fences.len()
            );
            Ok(())
        })
    }

    pub fn query_string(&self, dpy: HostHandle, name: i32) -> EglResult<String> {
        self.call(|| match name {
            EGL_VENDOR => Ok("Samsung".to_string()),
            EGL_VERSION => Ok("1.4".to_string()),
            EGL_CLIENT_APIS => {
                let mut apis = String::from("OpenGL_ES OpenGL_ES2");
                if self.rt.gl_version() >= GlVersion::Gl31Es3 {
                    apis.push_str(" OpenGL_ES3");
                }
                Ok(apis)
            }
            EGL_EXTENSIONS if dpy == EGL_NO_DISPLAY => Ok(Display::base_extensions().to_string()),
            EGL_EXTENSIONS => {
                let display = self.rt.displays().get(dpy).ok_or(EglError::BadDisplay)?;
                Ok(display.extensions())
            }
            _ => Err(EglError::BadParameter),
        })
    }

    /// Fills `configs` and returns how many were written, or returns the number of configs when
    /// `configs` is `None`.
    pub fn get_configs(
        &self,
        dpy: HostHandle,
        configs: Option<&mut [HostHandle]>,
    ) -> EglResult<i32> {
        self.call(|| {
            self.rt
                .with_transport(|t| host_egl::get_configs(t, dpy, configs))
        })
    }

    pub fn choose_config(
        &self,
        dpy: HostHandle,
        attribs: &[i32],
        configs: Option<&mut [HostHandle]>,
    ) -> EglResult<i32> {
        self.call(|| {
            let attribs = attrib_list(attribs);
            self.rt
                .with_transport(|t| host_egl::choose_config(t, dpy, &attribs, configs))
        })
    }

    pub fn get_config_attrib(
        &self,
        dpy: HostHandle,
        config: HostHandle,
        attribute: i32,
    ) -> EglResult<i32> {
        self.call(|| {
            let display = self.display(dpy)?;
            let caps = display.caps();
            match attribute {
                EGL_NATIVE_VISUAL_ID | EGL_NATIVE_VISUAL_TYPE => {
                    let (visual_id, visual_type) = caps.visual.ok_or(EglError::BadConfig)?;
                    if attribute == EGL_NATIVE_VISUAL_ID {
                        Ok(visual_id)
                    } else {
                        Ok(visual_type)
                    }
                }
                EGL_Y_INVERTED_NOK if caps.pixmaps => Ok(self.rt.backend().y_inverted() as i32),
                _ => self.rt.with_transport(|t| {
                    host_egl::get_config_attrib(t, display.host_handle(), config, attribute)
                }),
            }
        })
    }

    pub fn bind_api(&self, api: u32) -> EglResult<()> {
        self.call(|| {
            if api != EGL_OPENGL_ES_API {
                return Err(EglError::BadParameter);
            }
            self.rt.with_transport(|t| host_egl::bind_api(t, api));
            egl_state::set_api(&self.rt, api);
            Ok(())
        })
    }

    pub fn query_api(&self) -> u32 {
        egl_state::api(&self.rt)
    }

    pub fn create_context(
        &self,
        dpy: HostHandle,
        config: HostHandle,
        share: HostHandle,
        attribs: &[i32],
    ) -> EglResult<HostHandle> {
        self.call(|| {
            let rt = &self.rt;
            let display = self.display(dpy)?;
            let share = match share {
                EGL_NO_CONTEXT => None,
                handle => Some(self.context(&display, handle)?),
            };

            let api = client_api(egl_state::api(rt), attribs).ok_or(EglError::BadAttribute)?;
            if api == ClientApi::Gles3 && rt.gl_version() < GlVersion::Gl31Es3 {
                return Err(EglError::BadAttribute);
            }
            let iface = rt.clients().get(api).ok_or(EglError::BadAttribute)?;

            let attribs = attrib_list(attribs);
            let handle = rt.with_transport(|t| {
                host_egl::create_context(
                    t,
                    display.host_handle(),
                    config,
                    share.as_ref().map_or(EGL_NO_CONTEXT, |share| share.handle()),
                    &attribs,
                )
            })?;

            let client = iface.create_ctx(api, share.as_ref().map(|share| share.client()));
            let context = Context::new(handle, &display, client);
            if !display.add_context(&context) {
                warn!("host returned context {} twice", handle);
            }
            debug!("created context {} for {:?}", handle, api);
            Ok(handle)
        })
    }

    pub fn destroy_context(&self, dpy: HostHandle, ctx: HostHandle) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            self.rt
                .with_transport(|t| host_egl::destroy_context(t, display.host_handle(), ctx))?;
            let removed = display.remove_context(ctx);
            drop(removed);
            Ok(())
        })
    }

    pub fn query_context(&self, dpy: HostHandle, ctx: HostHandle, attribute: i32) -> EglResult<i32> {
        self.call(|| {
            let display = self.display(dpy)?;
            let context = self.context(&display, ctx)?;
            match attribute {
                EGL_CONTEXT_CLIENT_TYPE => Ok(EGL_OPENGL_ES_API as i32),
                EGL_CONTEXT_CLIENT_VERSION => Ok(context.client().api().version()),
                _ => self.rt.with_transport(|t| {
                    host_egl::query_context(t, display.host_handle(), ctx, attribute)
                }),
            }
        })
    }

    /// Binds `ctx` with `draw` and `read` to this thread, or releases the current context when
    /// all three are none.
    pub fn make_current(
        &self,
        dpy: HostHandle,
        draw: ClientHandle,
        read: ClientHandle,
        ctx: HostHandle,
    ) -> EglResult<()> {
        self.call(|| {
            let rt = &self.rt;
            let bad_match = if ctx != EGL_NO_CONTEXT {
                (draw == EGL_NO_SURFACE) != (read == EGL_NO_SURFACE)
            } else {
                draw != EGL_NO_SURFACE || read != EGL_NO_SURFACE
            };
            if bad_match {
                return Err(EglError::BadMatch);
            }

            let prev = egl_state::current(rt);
            let (display, draw, read, context) = if ctx == EGL_NO_CONTEXT {
                let Some(prev_context) = &prev.context else {
                    // Nothing to release.
                    return Ok(());
                };
                let display = if dpy == EGL_NO_DISPLAY {
                    prev_context.display().ok_or(EglError::BadDisplay)?
                } else {
                    self.display(dpy)?
                };
                (display, None, None, None)
            } else {
                let display = self.display(dpy)?;
                let draw = match draw {
                    EGL_NO_SURFACE => None,
                    handle => Some(self.surface(&display, handle)?),
                };
                let read = match read {
                    EGL_NO_SURFACE => None,
                    handle => Some(self.surface(&display, handle)?),
                };
                let context = self.context(&display, ctx)?;
                (display, draw, read, Some(context))
            };

            if let Some(context) = &context {
                if same(Some(context), prev.context.as_ref())
                    && context.belongs_to(&display)
                    && same(draw.as_ref(), prev.draw.as_ref())
                    && same(read.as_ref(), prev.read.as_ref())
                {
                    return Ok(());
                }
            }

            if draw.iter().chain(read.iter()).any(|surface| surface.locked()) {
                return Err(EglError::BadAccess);
            }

            if !egl_state::set_context(rt, context.clone(), draw.clone(), read.clone()) {
                return Err(EglError::BadAccess);
            }

            if let Some(prev_context) = &prev.context {
                if !same(Some(prev_context), context.as_ref()) {
                    prev_context.throttle(|| rt.with_transport(Transport::wait));
                }
            }

            rt.render_invalidate(false);

            let host_handle = |surface: &Option<Arc<Surface>>| {
                surface.as_ref().map_or(0, |surface| surface.host_handle())
            };
            rt.with_transport(|t| {
                host_egl::make_current(
                    t,
                    display.host_handle(),
                    host_handle(&draw),
                    host_handle(&read),
                    context.as_ref().map_or(EGL_NO_CONTEXT, |context| context.handle()),
                )
            });

            if let Some(context) = &context {
                context.prepare_client();
            }
            Ok(())
        })
    }

    pub fn release_thread(&self) -> EglResult<()> {
        self.call(|| {
            self.rt.with_transport(host_egl::release_thread)?;
            egl_state::reset(&self.rt);
            Ok(())
        })
    }

    pub fn get_current_context(&self) -> HostHandle {
        egl_state::context(&self.rt).map_or(EGL_NO_CONTEXT, |context| context.handle())
    }

    /// The current `EGL_DRAW` or `EGL_READ` surface.
    pub fn get_current_surface(&self, readdraw: i32) -> EglResult<ClientHandle> {
        self.call(|| {
            let surface = match readdraw {
                EGL_DRAW => egl_state::draw_surface(&self.rt),
                EGL_READ => egl_state::read_surface(&self.rt),
                _ => return Err(EglError::BadParameter),
            };
            Ok(surface.map_or(EGL_NO_SURFACE, |surface| surface.handle()))
        })
    }

    pub fn get_current_display(&self) -> HostHandle {
        egl_state::context(&self.rt)
            .and_then(|context| context.display())
            .map_or(EGL_NO_DISPLAY, |display| display.host_handle())
    }

    fn register_surface(&self, display: &Display, surface: Arc<Surface>) -> EglResult<ClientHandle> {
        if !display.add_surface(&surface) {
            let destroyed = self.rt.with_transport(|t| {
                host_egl::destroy_surface(t, display.host_handle(), surface.host_handle())
            });
            if let Err(e) = destroyed {
                warn!("failed to destroy surface {}: {}", surface.host_handle(), e);
            }
            return Err(EglError::BadAlloc);
        }
        Ok(surface.handle())
    }

    pub fn create_window_surface(
        &self,
        dpy: HostHandle,
        config: HostHandle,
        window: Box<dyn NativeDrawable>,
        attribs: &[i32],
    ) -> EglResult<ClientHandle> {
        self.call(|| {
            let display = self.display(dpy)?;
            let attribs = attrib_list(attribs);
            let surface = self.rt.backend().create_window_surface(
                &self.rt, &display, config, window, &attribs,
            )?;
            self.register_surface(&display, surface)
        })
    }

    pub fn create_pixmap_surface(
        &self,
        dpy: HostHandle,
        config: HostHandle,
        pixmap: Box<dyn NativeDrawable>,
        attribs: &[i32],
    ) -> EglResult<ClientHandle> {
        self.call(|| {
            let display = self.display(dpy)?;
            let attribs = attrib_list(attribs);
            let surface = self.rt.backend().create_pixmap_surface(
                &self.rt, &display, config, pixmap, &attribs,
            )?;
            self.register_surface(&display, surface)
        })
    }

    pub fn create_pbuffer_surface(
        &self,
        dpy: HostHandle,
        config: HostHandle,
        attribs: &[i32],
    ) -> EglResult<ClientHandle> {
        self.call(|| {
            let display = self.display(dpy)?;
            let attribs = attrib_list(attribs);
            let surface = self
                .rt
                .backend()
                .create_pbuffer_surface(&self.rt, &display, config, &attribs)?;
            self.register_surface(&display, surface)
        })
    }

    pub fn destroy_surface(&self, dpy: HostHandle, surface: ClientHandle) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            let sfc = self.surface(&display, surface)?;
            self.rt.with_transport(|t| {
                host_egl::destroy_surface(t, display.host_handle(), sfc.host_handle())
            })?;
            let removed = display.remove_surface(surface);
            if removed.is_none() {
                error!("surface {:#x} vanished while being destroyed", surface);
                return Err(EglError::BadSurface);
            }
            Ok(())
        })
    }

    /// Returns an attribute of `surface`. `EGL_BITMAP_POINTER_KHR` is an address, hence the
    /// 64-bit result.
    pub fn query_surface(
        &self,
        dpy: HostHandle,
        surface: ClientHandle,
        attribute: i32,
    ) -> EglResult<i64> {
        self.call(|| {
            let display = self.display(dpy)?;
            let surface = self.surface(&display, surface)?;
            let value = match attribute {
                EGL_BITMAP_POINTER_KHR => {
                    let mapping = surface.map(&self.rt).ok_or(EglError::BadAccess)?;
                    mapping.addr as i64
                }
                EGL_BITMAP_PITCH_KHR => {
                    let mapping = surface.map(&self.rt).ok_or(EglError::BadAccess)?;
                    mapping.stride as i64
                }
                EGL_BITMAP_ORIGIN_KHR => EGL_UPPER_LEFT_KHR as i64,
                EGL_BITMAP_PIXEL_RED_OFFSET_KHR => 16,
                EGL_BITMAP_PIXEL_GREEN_OFFSET_KHR => 8,
                EGL_BITMAP_PIXEL_BLUE_OFFSET_KHR => 0,
                EGL_BITMAP_PIXEL_ALPHA_OFFSET_KHR => 24,
                EGL_BITMAP_PIXEL_LUMINANCE_OFFSET_KHR => 0,
                EGL_BUFFER_AGE_EXT if display.caps().buffer_age && surface.native().is_some() => {
                    surface.native().map_or(0, |native| native.buffer_age()) as i64
                }
                _ => self.rt.with_transport(|t| {
                    host_egl::query_surface(
                        t,
                        display.host_handle(),
                        surface.host_handle(),
                        attribute,
                    )
                })? as i64,
            };
            Ok(value)
        })
    }

    pub fn surface_attrib(
        &self,
        dpy: HostHandle,
        surface: ClientHandle,
        attribute: i32,
        value: i32,
    ) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            let surface = self.surface(&display, surface)?;
            self.rt.with_transport(|t| {
                host_egl::surface_attrib(
                    t,
                    display.host_handle(),
                    surface.host_handle(),
                    attribute,
                    value,
                )
            })
        })
    }

    /// Binds the color buffer of a pbuffer to the current texture of the current context.
    pub fn bind_tex_image(&self, dpy: HostHandle, surface: ClientHandle, buffer: i32) -> EglResult<()> {
        self.call(|| {
            let rt = &self.rt;
            let iface = rt.clients().any().ok_or(EglError::BadAlloc)?;
            let Some(context) = egl_state::context(rt) else {
                warn!("eglBindTexImage without a current context");
                return Ok(());
            };
            let display = self.display(dpy)?;
            let surface = self.surface(&display, surface)?;
            if buffer != EGL_BACK_BUFFER {
                return Err(EglError::BadParameter);
            }
            if surface.surface_type() != SurfaceType::Pbuffer {
                return Err(EglError::BadSurface);
            }

            let image = surface.create_image(rt, iface.as_ref())?;
            let cookie = context
                .client()
                .bind_tex_image(&image, TexImageBinding::new(&surface))
                .ok_or(EglError::BadAccess)?;
            if !surface.bind_tex_image(iface.clone(), cookie) {
                iface.release_tex_image(cookie);
                return Err(EglError::BadAccess);
            }
            Ok(())
        })
    }

    pub fn release_tex_image(
        &self,
        dpy: HostHandle,
        surface: ClientHandle,
        buffer: i32,
    ) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            let surface = self.surface(&display, surface)?;
            if buffer != EGL_BACK_BUFFER {
                return Err(EglError::BadParameter);
            }
            if surface.surface_type() != SurfaceType::Pbuffer {
                return Err(EglError::BadSurface);
            }
            surface.release_tex_image();
            Ok(())
        })
    }

    /// Sets the swap interval of the current window surface, at least 1.
    pub fn swap_interval(&self, _dpy: HostHandle, interval: i32) -> EglResult<()> {
        if let Some(draw) = egl_state::draw_surface(&self.rt) {
            if draw.surface_type() == SurfaceType::Window {
                draw.set_swap_interval(&self.rt, interval.max(1));
            }
        }
        Ok(())
    }

    pub fn wait_client(&self) -> EglResult<()> {
        if let Some(draw) = egl_state::draw_surface(&self.rt) {
            draw.wait_gl(&self.rt);
        }
        Ok(())
    }

    pub fn wait_gl(&self) -> EglResult<()> {
        self.wait_client()
    }

    pub fn wait_native(&self, _engine: i32) -> EglResult<()> {
        if let Some(draw) = egl_state::draw_surface(&self.rt) {
            draw.wait_x(&self.rt);
        }
        Ok(())
    }

    /// Looks up a surface that is current on this thread and not locked.
    fn current_unlocked_surface(
        &self,
        dpy: HostHandle,
        surface: ClientHandle,
    ) -> EglResult<Arc<Surface>> {
        let display = self.display(dpy)?;
        let surface = self.surface(&display, surface)?;
        let current = egl_state::current(&self.rt);
        let is_current = [current.draw, current.read]
            .iter()
            .flatten()
            .any(|current| Arc::ptr_eq(current, &surface));
        if !is_current {
            return Err(EglError::BadSurface);
        }
        if surface.locked() {
            return Err(EglError::BadAccess);
        }
        Ok(surface)
    }

    pub fn swap_buffers(&self, dpy: HostHandle, surface: ClientHandle) -> EglResult<()> {
        self.call(|| {
            let surface = self.current_unlocked_surface(dpy, surface)?;
            if surface.surface_type() != SurfaceType::Window {
                return Ok(());
            }
            surface.swap_buffers(&self.rt)
        })
    }

    /// Copies the color buffer of `surface` into the native pixmap `target`.
    pub fn copy_buffers(
        &self,
        dpy: HostHandle,
        surface: ClientHandle,
        target: &dyn NativeDrawable,
    ) -> EglResult<()> {
        self.call(|| {
            let surface = self.current_unlocked_surface(dpy, surface)?;
            surface.copy_buffers(&self.rt, target)
        })
    }

    pub fn create_image(
        &self,
        dpy: HostHandle,
        ctx: HostHandle,
        source: ImageSource,
        attribs: &[i32],
    ) -> EglResult<ClientHandle> {
        self.call(|| {
            let rt = &self.rt;
            let iface = rt.clients().any().ok_or(EglError::BadAlloc)?;
            let display = self.display(dpy)?;
            let caps = display.caps();
            let backend = rt.backend();

            let image = match source {
                ImageSource::Pixmap(pixmap) => {
                    if pixmap.id() == 0 || !caps.pixmaps {
                        return Err(EglError::BadParameter);
                    }
                    check_attribs(attribs, &[EGL_IMAGE_PRESERVED_KHR])?;
                    backend.create_image_pixmap(rt, &display, pixmap, iface.as_ref())?
                }
                ImageSource::WaylandBuffer(buffer) => {
                    if buffer == 0 || !caps.wl_bind {
                        return Err(EglError::BadParameter);
                    }
                    check_attribs(attribs, &[EGL_IMAGE_PRESERVED_KHR, EGL_WAYLAND_PLANE_WL])?;
                    backend.create_image_wl_buffer(rt, &display, buffer, iface.as_ref())?
                }
                ImageSource::GlTexture2D(texture) => {
                    if texture == 0 {
                        return Err(EglError::BadParameter);
                    }
                    let context = self.context(&display, ctx)?;
                    check_attribs(attribs, &[EGL_IMAGE_PRESERVED_KHR])?;
                    backend.create_image_gl_texture_2d(
                        rt,
                        &display,
                        &context,
                        texture,
                        iface.as_ref(),
                    )?
                }
                ImageSource::Unsupported(target) => {
                    debug!("unsupported image target {:#x}", target);
                    return Err(EglError::BadParameter);
                }
            };

            if !display.add_image(&image) {
                return Err(EglError::BadParameter);
            }
            Ok(image.handle())
        })
    }

    pub fn destroy_image(&self, dpy: HostHandle, image: ClientHandle) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            display.image(image).ok_or(EglError::BadParameter)?;
            let removed = display.remove_image(image);
            if removed.is_none() {
                error!("image {:#x} vanished while being destroyed", image);
                return Err(EglError::BadParameter);
            }
            Ok(())
        })
    }

    /// Looks up an image for the GLES layer and brings its contents up to date.
    pub fn acquire_image(&self, dpy: HostHandle, image: ClientHandle) -> EglResult<Arc<Image>> {
        self.call(|| {
            let display = self.display(dpy)?;
            let image = display.image(image).ok_or(EglError::BadParameter)?;
            image.update(&self.rt);
            Ok(image)
        })
    }

    /// Locks `surface` for CPU access.
    ///
    /// The access hint is write only unless `EGL_MAP_PRESERVE_PIXELS_KHR` is set. An explicit
    /// `EGL_LOCK_USAGE_HINT_KHR` overrides it, 0 meaning read and write.
    pub fn lock_surface(&self, dpy: HostHandle, surface: ClientHandle, attribs: &[i32]) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            let surface = self.surface(&display, surface)?;

            let mut preserve = false;
            let mut usage = None;
            for (name, value) in attrib_pairs(attribs) {
                match name {
                    EGL_MAP_PRESERVE_PIXELS_KHR => preserve = value != 0,
                    EGL_LOCK_USAGE_HINT_KHR => usage = Some(value),
                    _ => return Err(EglError::BadAttribute),
                }
            }
            let hint = usage.unwrap_or(if preserve {
                EGL_READ_SURFACE_BIT_KHR | EGL_WRITE_SURFACE_BIT_KHR
            } else {
                EGL_WRITE_SURFACE_BIT_KHR
            });

            if !surface.lock(hint) {
                return Err(EglError::BadAccess);
            }
            Ok(())
        })
    }

    pub fn unlock_surface(&self, dpy: HostHandle, surface: ClientHandle) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            let surface = self.surface(&display, surface)?;
            if !surface.unlock(&self.rt) {
                return Err(EglError::BadAccess);
            }
            surface.invalidate(&self.rt);
            Ok(())
        })
    }

    /// Creates a fence sync object signaled once all work submitted so far has completed.
    pub fn create_sync(&self, dpy: HostHandle, ty: u32, attribs: &[i32]) -> EglResult<SyncHandle> {
        self.call(|| {
            if ty != EGL_SYNC_FENCE_KHR {
                return Err(EglError::BadAttribute);
            }
            if attribs.first().is_some_and(|&name| name != EGL_NONE) {
                return Err(EglError::BadAttribute);
            }
            let display = self.display(dpy)?;
            let fence = self
                .rt
                .backend()
                .create_fence(&display)
                .ok_or(EglError::BadAccess)?;
            if !display.add_fence(&fence) {
                error!("sync {} is already registered", fence.seq());
                return Err(EglError::BadAlloc);
            }
            self.rt.with_transport(|t| t.flush(Some(&fence)));
            Ok(fence.seq())
        })
    }

    pub fn destroy_sync(&self, dpy: HostHandle, sync: SyncHandle) -> EglResult<()> {
        self.call(|| {
            let display = self.display(dpy)?;
            self.fence(&display, sync)?;
            let removed = display.remove_fence(sync);
            if removed.is_none() {
                error!("sync {} vanished while being destroyed", sync);
                return Err(EglError::BadParameter);
            }
            Ok(())
        })
    }

    /// Waits for `sync`. A zero timeout only polls. Other timeouts wait without limit.
    pub fn client_wait_sync(
        &self,
        dpy: HostHandle,
        sync: SyncHandle,
        _flags: i32,
        timeout: u64,
    ) -> EglResult<i32> {
        self.call(|| {
            let display = self.display(dpy)?;
            let fence = self.fence(&display, sync)?;
            if timeout == 0 {
                return Ok(if fence.signaled() {
                    EGL_CONDITION_SATISFIED_KHR
                } else {
                    EGL_TIMEOUT_EXPIRED_KHR
                });
            }
            if fence.wait() {
                Ok(EGL_CONDITION_SATISFIED_KHR)
            } else {
                Err(EglError::BadAccess)
            }
        })
    }

    /// Fence syncs cannot be signaled by the application.
    pub fn signal_sync(&self, _dpy: HostHandle, _sync: SyncHandle, _mode: u32) -> EglResult<()> {
        self.call(|| Err(EglError::BadMatch))
    }

    pub fn get_sync_attrib(&self, dpy: HostHandle, sync: SyncHandle, attribute: i32) -> EglResult<i32> {
        self.call(|| {
            let display = self.display(dpy)?;
            let fence = self.fence(&display, sync)?;
            match attribute {
                EGL_SYNC_TYPE_KHR => Ok(EGL_SYNC_FENCE_KHR as i32),
                EGL_SYNC_STATUS_KHR if fence.signaled() => Ok(EGL_SIGNALED_KHR),
                EGL_SYNC_STATUS_KHR => Ok(EGL_UNSIGNALED_KHR),
                EGL_SYNC_CONDITION_KHR => Ok(EGL_SYNC_PRIOR_COMMANDS_COMPLETE_KHR),
                _ => Err(EglError::BadAttribute),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attrib_lists_end_at_none() {
        assert_eq!(attrib_list(&[]), vec![EGL_NONE]);
        assert_eq!(
            attrib_list(&[EGL_WIDTH, 4, EGL_NONE, EGL_HEIGHT, 8]),
            vec![EGL_WIDTH, 4, EGL_NONE]
        );
        assert_eq!(
            attrib_pairs(&[EGL_WIDTH, 4, EGL_HEIGHT]).collect::<Vec<_>>(),
            vec![(EGL_WIDTH, 4)]
        );
    }

    #[test]
    fn image_attribs() {
        let allowed = [EGL_IMAGE_PRESERVED_KHR];
        assert!(check_attribs(&[EGL_NONE], &allowed).is_ok());
        assert!(check_attribs(&[EGL_IMAGE_PRESERVED_KHR, 1, EGL_NONE], &allowed).is_ok());
        assert_eq!(
            check_attribs(&[EGL_WAYLAND_PLANE_WL, 0, EGL_NONE], &allowed),
            Err(EglError::BadAttribute)
        );
    }

    #[test]
    fn client_api_from_attribs() {
        assert_eq!(
            client_api(EGL_OPENGL_ES_API, &[EGL_NONE]),
            Some(ClientApi::Gles1)
        );
        assert_eq!(
            client_api(EGL_OPENGL_ES_API, &[EGL_CONTEXT_CLIENT_VERSION, 3, EGL_NONE]),
            Some(ClientApi::Gles3)
        );
        assert_eq!(
            client_api(EGL_OPENGL_ES_API, &[EGL_CONTEXT_CLIENT_VERSION, 4, EGL_NONE]),
            None
        );
        assert_eq!(client_api(EGL_OPENGL_ES_API, &[EGL_WIDTH, 1, EGL_NONE]), None);
        assert_eq!(client_api(0x30A2, &[EGL_NONE]), None);
    }

    #[test]
    fn image_targets() {
        assert_eq!(ImageSource::WaylandBuffer(1).target(), EGL_WAYLAND_BUFFER_WL);
        assert_eq!(ImageSource::GlTexture2D(1).target(), EGL_GL_TEXTURE_2D_KHR);
        assert_eq!(ImageSource::Unsupported(0x3140).target(), 0x3140);
    }
}
