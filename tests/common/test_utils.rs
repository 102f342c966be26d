#![allow(dead_code)]

use std::{
    collections::VecDeque,
    ops::Range,
    sync::{Arc, Mutex},
    time::Duration,
};

use frame_ngin::{
    data_structures::frame_pool::Uniforms,
    flow::RenderDelegate,
    gpu::{CompletionHandler, DrawCall, DrawableSource, Gpu},
};

/// A buffer whose contents can be inspected after the fact.
pub struct MockBuffer {
    pub label: String,
    pub contents: Mutex<Vec<u8>>,
}

pub struct MockTexture(pub String);

/// Stands in for a swapchain image; the number identifies the refresh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockFrame(pub u32);

/// What the mock saw for one `submit`.
#[derive(Clone, Debug)]
pub struct Submission {
    pub label: String,
    pub uniform_label: String,
    pub uniforms: Vec<u8>,
    pub vertices: Range<u32>,
    pub instances: Range<u32>,
    pub texture: Option<String>,
    pub cleared: bool,
    pub target: MockFrame,
}

impl Submission {
    pub fn uniforms(&self) -> Uniforms {
        bytemuck::pod_read_unaligned(&self.uniforms)
    }
}

#[derive(Default)]
struct State {
    submissions: Vec<Submission>,
    pending: VecDeque<(String, CompletionHandler)>,
    presented: Vec<MockFrame>,
    uniform_buffers: Vec<String>,
    overwrites_in_flight: usize,
}

/// Records every call and holds completion handlers until a test fires them.
#[derive(Default)]
pub struct MockGpu {
    state: Mutex<State>,
}

impl MockGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submission_count(&self) -> usize {
        self.state.lock().unwrap().submissions.len()
    }

    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }

    pub fn presented(&self) -> Vec<MockFrame> {
        self.state.lock().unwrap().presented.clone()
    }

    pub fn uniform_buffers(&self) -> Vec<String> {
        self.state.lock().unwrap().uniform_buffers.clone()
    }

    /// Uniform writes that hit a buffer some uncompleted submission still reads.
    pub fn overwrites_in_flight(&self) -> usize {
        self.state.lock().unwrap().overwrites_in_flight
    }

    /// Completes the oldest outstanding submission. Returns `false` if there is none.
    pub fn complete_next(&self) -> bool {
        let next = self.state.lock().unwrap().pending.pop_front();
        match next {
            Some((_, on_complete)) => {
                on_complete();
                true
            }
            None => false,
        }
    }

    /// Completes the newest outstanding submission first.
    pub fn complete_latest(&self) -> bool {
        let next = self.state.lock().unwrap().pending.pop_back();
        match next {
            Some((_, on_complete)) => {
                on_complete();
                true
            }
            None => false,
        }
    }

    pub fn complete_all(&self) -> usize {
        let mut completed = 0;
        while self.complete_next() {
            completed += 1;
        }
        completed
    }
}

impl Gpu for MockGpu {
    type UniformBuffer = MockBuffer;
    type VertexBuffer = MockBuffer;
    type Texture = MockTexture;
    type Target = MockFrame;

    fn create_uniform_buffer(&self, label: &str, size: u64) -> MockBuffer {
        self.state
            .lock()
            .unwrap()
            .uniform_buffers
            .push(label.to_string());
        MockBuffer {
            label: label.to_string(),
            contents: Mutex::new(vec![0; size as usize]),
        }
    }

    fn create_vertex_buffer(&self, label: &str, contents: &[u8]) -> MockBuffer {
        MockBuffer {
            label: label.to_string(),
            contents: Mutex::new(contents.to_vec()),
        }
    }

    fn write_uniforms(&self, buffer: &MockBuffer, contents: &[u8]) {
        {
            let mut state = self.state.lock().unwrap();
            if state.pending.iter().any(|(label, _)| *label == buffer.label) {
                state.overwrites_in_flight += 1;
            }
        }
        let mut data = buffer.contents.lock().unwrap();
        data[..contents.len()].copy_from_slice(contents);
    }

    fn submit(&self, draw: DrawCall<'_, Self>, target: &MockFrame, on_complete: CompletionHandler) {
        let submission = Submission {
            label: draw.label.to_string(),
            uniform_label: draw.uniforms.label.clone(),
            uniforms: draw.uniforms.contents.lock().unwrap().clone(),
            vertices: draw.vertices,
            instances: draw.instances,
            texture: draw.texture.map(|t| t.0.clone()),
            cleared: draw.clear.is_some(),
            target: *target,
        };
        let mut state = self.state.lock().unwrap();
        state
            .pending
            .push_back((submission.uniform_label.clone(), on_complete));
        state.submissions.push(submission);
    }

    fn present(&self, target: MockFrame) {
        self.state.lock().unwrap().presented.push(target);
    }
}

/// Hands out the scripted frames in order, then nothing.
pub struct ScriptedDrawables {
    script: VecDeque<Option<MockFrame>>,
    pub requests: usize,
}

impl ScriptedDrawables {
    pub fn new(script: impl IntoIterator<Item = Option<MockFrame>>) -> Self {
        Self {
            script: script.into_iter().collect(),
            requests: 0,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// A fresh frame on every request.
    pub fn always(count: u32) -> Self {
        Self::new((0..count).map(|i| Some(MockFrame(i))))
    }
}

impl DrawableSource for ScriptedDrawables {
    type Target = MockFrame;

    fn next_drawable(&mut self) -> anyhow::Result<Option<MockFrame>> {
        self.requests += 1;
        Ok(self.script.pop_front().flatten())
    }
}

/// A drawable source whose device is gone.
pub struct LostDevice;

impl DrawableSource for LostDevice {
    type Target = MockFrame;

    fn next_drawable(&mut self) -> anyhow::Result<Option<MockFrame>> {
        anyhow::bail!("the surface ran out of memory")
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Hook {
    Update(Duration),
    Render(MockFrame),
    Resize(u32, u32),
    Shutdown,
}

/// Logs every hook call into a shared list the test keeps a handle to.
#[derive(Clone, Default)]
pub struct RecordingDelegate {
    pub hooks: Arc<Mutex<Vec<Hook>>>,
}

impl RecordingDelegate {
    pub fn hooks(&self) -> Vec<Hook> {
        self.hooks.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<Duration> {
        self.hooks()
            .into_iter()
            .filter_map(|hook| match hook {
                Hook::Update(dt) => Some(dt),
                _ => None,
            })
            .collect()
    }

    pub fn renders(&self) -> usize {
        self.hooks()
            .iter()
            .filter(|hook| matches!(hook, Hook::Render(_)))
            .count()
    }
}

impl RenderDelegate<MockFrame> for RecordingDelegate {
    fn on_update(&mut self, dt: Duration) {
        self.hooks.lock().unwrap().push(Hook::Update(dt));
    }

    fn on_render(&mut self, target: MockFrame) -> anyhow::Result<()> {
        self.hooks.lock().unwrap().push(Hook::Render(target));
        Ok(())
    }

    fn on_resize(&mut self, width: u32, height: u32) {
        self.hooks.lock().unwrap().push(Hook::Resize(width, height));
    }

    fn on_shutdown(&mut self) {
        self.hooks.lock().unwrap().push(Hook::Shutdown);
    }
}
