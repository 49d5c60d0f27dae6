// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Host EGL calls.
//!
//! Each wrapper encodes one call in argument order. By-reference results, including the return
//! value, come last, followed by the host's error code. A call that produces no result is only
//! batched.

use enumn::N;

use crate::error::EglError;
use crate::error::EglResult;
use crate::resource::HostHandle;
use crate::transport::array_size;
use crate::transport::ApiId;
use crate::transport::Transport;
use crate::transport::SLOT_SIZE;

/// By-value scalar.
const OUT: usize = SLOT_SIZE;
/// By-reference scalar or return value.
const IN: usize = 2 * SLOT_SIZE;
/// Smallest encoding of an array: its address and count.
const ARRAY: usize = 2 * SLOT_SIZE;

#[derive(Copy, Clone, Debug, PartialEq, Eq, N)]
#[repr(u32)]
pub enum EglFunc {
    GetDisplay = 1,
    Initialize = 2,
    Terminate = 3,
    GetConfigs = 4,
    ChooseConfig = 5,
    GetConfigAttrib = 6,
    DestroySurface = 7,
    QuerySurface = 8,
    BindApi = 9,
    WaitClient = 10,
    ReleaseThread = 11,
    SurfaceAttrib = 12,
    CreateContext = 13,
    DestroyContext = 14,
    MakeCurrent = 15,
    QueryContext = 16,
    SwapBuffers = 17,
    CopyBuffers = 18,
    CreateWindowSurfaceOffscreen = 19,
    CreatePixmapSurfaceOffscreen = 20,
    CreatePbufferSurfaceOffscreen = 21,
    ResizeOffscreenSurface = 22,
    CreateImage = 23,
}

fn check(ok: u32, error: i32) -> EglResult<()> {
    if ok != 0 {
        Ok(())
    } else {
        Err(EglError::from_host(error))
    }
}

fn check_handle(handle: HostHandle, error: i32) -> EglResult<HostHandle> {
    if handle != 0 {
        Ok(handle)
    } else {
        Err(EglError::from_host(error))
    }
}

fn int_array_size(data: &[i32]) -> usize {
    array_size(data.len(), 4)
}

pub fn get_display(t: &mut Transport, display_id: u64) -> EglResult<HostHandle> {
    let (mut error, mut ret) = (0i32, 0u32);
    let size = OUT + 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::GetDisplay as u32, size, size);
    call.put_out(display_id);
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check_handle(ret, error)
}

/// Returns the EGL version as (major, minor).
pub fn initialize(t: &mut Transport, dpy: HostHandle) -> EglResult<(i32, i32)> {
    let (mut major, mut minor, mut error, mut ret) = (0i32, 0i32, 0i32, 0u32);
    let size = OUT + 4 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::Initialize as u32, size, size);
    call.put_out_handle(dpy);
    call.put_in(Some(&mut major));
    call.put_in(Some(&mut minor));
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error).map(|_| (major, minor))
}

pub fn terminate(t: &mut Transport, dpy: HostHandle) -> EglResult<()> {
    let (mut error, mut ret) = (0i32, 0u32);
    let size = OUT + 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::Terminate as u32, size, size);
    call.put_out_handle(dpy);
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error)
}

/// Fills `configs` and returns the number of configs written, or the total number of configs
/// when `configs` is `None`.
pub fn get_configs(
    t: &mut Transport,
    dpy: HostHandle,
    configs: Option<&mut [HostHandle]>,
) -> EglResult<i32> {
    let (mut count, mut num_config, mut error, mut ret) = (0i32, 0i32, 0i32, 0u32);
    let capacity = configs.as_deref().map_or(0, <[HostHandle]>::len);
    let min = OUT + ARRAY + 3 * IN;
    let max = OUT + array_size(capacity, 4) + 3 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::GetConfigs as u32, min, max);
    call.put_out_handle(dpy);
    call.put_in_array(configs, Some(&mut count));
    call.put_in(Some(&mut num_config));
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error).map(|_| num_config)
}

/// Like `get_configs`, restricted to configs matching `attribs`.
pub fn choose_config(
    t: &mut Transport,
    dpy: HostHandle,
    attribs: &[i32],
    configs: Option<&mut [HostHandle]>,
) -> EglResult<i32> {
    let (mut count, mut num_config, mut error, mut ret) = (0i32, 0i32, 0i32, 0u32);
    let capacity = configs.as_deref().map_or(0, <[HostHandle]>::len);
    let min = OUT + 2 * ARRAY + 3 * IN;
    let max = OUT + int_array_size(attribs) + array_size(capacity, 4) + 3 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::ChooseConfig as u32, min, max);
    call.put_out_handle(dpy);
    call.put_out_array(Some(attribs));
    call.put_in_array(configs, Some(&mut count));
    call.put_in(Some(&mut num_config));
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error).map(|_| num_config)
}

pub fn get_config_attrib(
    t: &mut Transport,
    dpy: HostHandle,
    config: HostHandle,
    attribute: i32,
) -> EglResult<i32> {
    let (mut value, mut error, mut ret) = (0i32, 0i32, 0u32);
    let size = 3 * OUT + 3 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::GetConfigAttrib as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(config);
    call.put_out(attribute);
    call.put_in(Some(&mut value));
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error).map(|_| value)
}

pub fn destroy_surface(t: &mut Transport, dpy: HostHandle, surface: HostHandle) -> EglResult<()> {
    let (mut error, mut ret) = (0i32, 0u32);
    let size = 2 * OUT + 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::DestroySurface as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(surface);
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error)
}

pub fn query_surface(
    t: &mut Transport,
    dpy: HostHandle,
    surface: HostHandle,
    attribute: i32,
) -> EglResult<i32> {
    let (mut value, mut error, mut ret) = (0i32, 0i32, 0u32);
    let size = 3 * OUT + 3 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::QuerySurface as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(surface);
    call.put_out(attribute);
    call.put_in(Some(&mut value));
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error).map(|_| value)
}

pub fn bind_api(t: &mut Transport, api: u32) {
    let mut call = t.begin(ApiId::Egl, EglFunc::BindApi as u32, OUT, OUT);
    call.put_out(api);
    call.end();
}

pub fn wait_client(t: &mut Transport) {
    t.begin(ApiId::Egl, EglFunc::WaitClient as u32, 0, 0).end();
}

pub fn release_thread(t: &mut Transport) -> EglResult<()> {
    let (mut error, mut ret) = (0i32, 0u32);
    let size = 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::ReleaseThread as u32, size, size);
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error)
}

pub fn surface_attrib(
    t: &mut Transport,
    dpy: HostHandle,
    surface: HostHandle,
    attribute: i32,
    value: i32,
) -> EglResult<()> {
    let (mut error, mut ret) = (0i32, 0u32);
    let size = 4 * OUT + 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::SurfaceAttrib as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(surface);
    call.put_out(attribute);
    call.put_out(value);
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error)
}

pub fn create_context(
    t: &mut Transport,
    dpy: HostHandle,
    config: HostHandle,
    share: HostHandle,
    attribs: &[i32],
) -> EglResult<HostHandle> {
    let (mut error, mut ret) = (0i32, 0u32);
    let min = 3 * OUT + ARRAY + 2 * IN;
    let max = 3 * OUT + int_array_size(attribs) + 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::CreateContext as u32, min, max);
    call.put_out_handle(dpy);
    call.put_out_handle(config);
    call.put_out_handle(share);
    call.put_out_array(Some(attribs));
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check_handle(ret, error)
}

pub fn destroy_context(t: &mut Transport, dpy: HostHandle, context: HostHandle) -> EglResult<()> {
    let (mut error, mut ret) = (0i32, 0u32);
    let size = 2 * OUT + 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::DestroyContext as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(context);
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error)
}

pub fn make_current(
    t: &mut Transport,
    dpy: HostHandle,
    draw: HostHandle,
    read: HostHandle,
    context: HostHandle,
) {
    let size = 4 * OUT;
    let mut call = t.begin(ApiId::Egl, EglFunc::MakeCurrent as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(draw);
    call.put_out_handle(read);
    call.put_out_handle(context);
    call.end();
}

pub fn query_context(
    t: &mut Transport,
    dpy: HostHandle,
    context: HostHandle,
    attribute: i32,
) -> EglResult<i32> {
    let (mut value, mut error, mut ret) = (0i32, 0i32, 0u32);
    let size = 3 * OUT + 3 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::QueryContext as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(context);
    call.put_out(attribute);
    call.put_in(Some(&mut value));
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error).map(|_| value)
}

pub fn swap_buffers(t: &mut Transport, dpy: HostHandle, surface: HostHandle) {
    let size = 2 * OUT;
    let mut call = t.begin(ApiId::Egl, EglFunc::SwapBuffers as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(surface);
    call.end();
}

pub fn copy_buffers(t: &mut Transport, dpy: HostHandle, surface: HostHandle) {
    let size = 2 * OUT;
    let mut call = t.begin(ApiId::Egl, EglFunc::CopyBuffers as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(surface);
    call.end();
}

/// A guest pixel buffer the host renders an offscreen surface into.
#[derive(Copy, Clone, Debug)]
pub struct OffscreenBuffer {
    pub width: u32,
    pub height: u32,
    pub bpp: u32,
    /// Guest address of `width * height * bpp` pinned bytes.
    pub pixels: u64,
}

/// Creates a window, pixmap or pbuffer surface, depending on `func`.
pub fn create_surface_offscreen(
    t: &mut Transport,
    func: EglFunc,
    dpy: HostHandle,
    config: HostHandle,
    buffer: OffscreenBuffer,
    attribs: &[i32],
) -> EglResult<HostHandle> {
    debug_assert!(matches!(
        func,
        EglFunc::CreateWindowSurfaceOffscreen
            | EglFunc::CreatePixmapSurfaceOffscreen
            | EglFunc::CreatePbufferSurfaceOffscreen
    ));
    let (mut error, mut ret) = (0i32, 0u32);
    let min = 6 * OUT + ARRAY + 2 * IN;
    let max = 6 * OUT + int_array_size(attribs) + 2 * IN;
    let mut call = t.begin(ApiId::Egl, func as u32, min, max);
    call.put_out_handle(dpy);
    call.put_out_handle(config);
    call.put_out(buffer.width);
    call.put_out(buffer.height);
    call.put_out(buffer.bpp);
    call.put_out(buffer.pixels);
    call.put_out_array(Some(attribs));
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check_handle(ret, error)
}

/// Points the host at a new backing buffer for `surface`.
pub fn resize_offscreen_surface(
    t: &mut Transport,
    dpy: HostHandle,
    surface: HostHandle,
    buffer: OffscreenBuffer,
) -> EglResult<()> {
    let (mut error, mut ret) = (0i32, 0u32);
    let size = 6 * OUT + 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::ResizeOffscreenSurface as u32, size, size);
    call.put_out_handle(dpy);
    call.put_out_handle(surface);
    call.put_out(buffer.width);
    call.put_out(buffer.height);
    call.put_out(buffer.bpp);
    call.put_out(buffer.pixels);
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error)
}

/// Creates the host texture `tex_global_name` from `buffer`, or an empty one when `buffer` is 0.
pub fn create_image(
    t: &mut Transport,
    tex_global_name: u32,
    dpy: HostHandle,
    buffer: u64,
) -> EglResult<()> {
    let (mut error, mut ret) = (0i32, 0u32);
    let size = 3 * OUT + 2 * IN;
    let mut call = t.begin(ApiId::Egl, EglFunc::CreateImage as u32, size, size);
    call.put_out(tex_global_name);
    call.put_out_handle(dpy);
    call.put_out(buffer);
    call.put_in(Some(&mut error));
    call.put_in(Some(&mut ret));
    call.end();
    check(ret, error)
}
