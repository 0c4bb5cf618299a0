/// Mock graphics device for unit tests (no GPU required)
///
/// Every object shares one `MockGpu` timeline that records submissions,
/// semaphore signal/wait pairs, fence waits and resets, swapchain events and
/// buffer writes. Work stays pending until a fence wait (or `wait_idle`)
/// retires it, so a CPU write to a buffer referenced by pending work is
/// reported as a race.
///
/// Fault injection:
/// - `set_skip_fence_waits(true)` turns fence waits into no-ops
/// - `fail_acquire_at(n)` makes the n-th acquire report out-of-date
/// - `queue_present_result(r)` scripts the next present result
/// - `set_hang_fence_waits(true)` makes pending fence waits time out

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{Error, Result};
use crate::graphics_device::{
    AcquireResult, Buffer, BufferDesc, BufferUsage, ClearValue, ColorSpace, CommandBuffer,
    CommandBufferUsage, DescriptorBinding, DescriptorPool, DescriptorPoolDesc, DescriptorSet,
    DescriptorSetLayout, DescriptorSetLayoutDesc, Extent2D, Fence, FenceWait, Framebuffer,
    FramebufferDesc, GraphicsDevice, IndexType, Pipeline, PipelineDesc, PresentMode,
    PresentResult, Rect2D, RenderPass, RenderPassDesc, Sampler, SamplerDesc, Semaphore, Shader,
    ShaderDesc, ShaderStage, ShaderStageFlags, SubmitInfo, SurfaceCapabilities, SurfaceFormat,
    Swapchain, SwapchainDesc, Texture, TextureDesc, TextureFormat, TextureInfo, TextureUsage,
    Viewport,
};

// ============================================================================
// Timeline
// ============================================================================

/// One observable GPU/presentation event
#[derive(Debug, Clone, PartialEq)]
pub enum GpuEvent {
    Submit {
        submission: u64,
        command_buffers: Vec<u64>,
        commands: Vec<String>,
        waits: Vec<u64>,
        signals: Vec<u64>,
        fence: Option<u64>,
    },
    FenceWait { fence: u64 },
    FenceReset { fence: u64 },
    Acquire { image: Option<u32>, signal: u64 },
    Present { image: u32, wait: u64 },
    SwapchainCreated { image_count: u32, extent: Extent2D },
    SwapchainRecreated { image_count: u32, extent: Extent2D },
    BufferWrite { buffer: u64 },
    WaitIdle,
}

struct PendingSubmission {
    id: u64,
    fence: Option<u64>,
    buffers: FxHashSet<u64>,
}

/// Shared state behind every mock object
pub struct MockGpu {
    next_id: u64,
    events: Vec<GpuEvent>,
    pending: VecDeque<PendingSubmission>,
    signaled_fences: FxHashSet<u64>,
    signaled_semaphores: FxHashSet<u64>,
    violations: Vec<String>,
    races: Vec<String>,
    skip_fence_waits: bool,
    hang_fence_waits: bool,
    out_of_date_acquires: FxHashSet<usize>,
    acquire_calls: usize,
    present_results: VecDeque<PresentResult>,
    max_fences_in_flight: usize,
    capabilities: SurfaceCapabilities,
    created: FxHashMap<&'static str, usize>,
}

impl MockGpu {
    fn new(capabilities: SurfaceCapabilities) -> Self {
        Self {
            next_id: 1,
            events: Vec::new(),
            pending: VecDeque::new(),
            signaled_fences: FxHashSet::default(),
            signaled_semaphores: FxHashSet::default(),
            violations: Vec::new(),
            races: Vec::new(),
            skip_fence_waits: false,
            hang_fence_waits: false,
            out_of_date_acquires: FxHashSet::default(),
            acquire_calls: 0,
            present_results: VecDeque::new(),
            max_fences_in_flight: 0,
            capabilities,
            created: FxHashMap::default(),
        }
    }

    fn alloc_id(&mut self, kind: &'static str) -> u64 {
        *self.created.entry(kind).or_insert(0) += 1;
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn signal_semaphore(&mut self, semaphore: u64) {
        if !self.signaled_semaphores.insert(semaphore) {
            self.violations.push(format!("semaphore {} signaled twice without a wait", semaphore));
        }
    }

    fn consume_semaphore(&mut self, semaphore: u64) {
        if !self.signaled_semaphores.remove(&semaphore) {
            self.violations.push(format!("wait on semaphore {} that nothing signaled", semaphore));
        }
    }

    fn fences_in_flight(&self) -> usize {
        self.pending
            .iter()
            .filter_map(|p| p.fence)
            .collect::<FxHashSet<_>>()
            .len()
    }

    /// Retire pending work in queue order up to the last submission using `fence`
    fn retire_through(&mut self, fence: u64) {
        let Some(last) = self.pending.iter().rposition(|p| p.fence == Some(fence)) else {
            return;
        };
        for _ in 0..=last {
            if let Some(done) = self.pending.pop_front() {
                if let Some(f) = done.fence {
                    self.signaled_fences.insert(f);
                }
            }
        }
    }

    fn retire_all(&mut self) {
        while let Some(done) = self.pending.pop_front() {
            if let Some(f) = done.fence {
                self.signaled_fences.insert(f);
            }
        }
    }
}

// ============================================================================
// Downcasts (only mock objects exist in tests)
// ============================================================================

fn mock_semaphore(semaphore: &dyn Semaphore) -> &MockSemaphore {
    unsafe { &*(semaphore as *const dyn Semaphore as *const MockSemaphore) }
}

fn mock_fence(fence: &dyn Fence) -> &MockFence {
    unsafe { &*(fence as *const dyn Fence as *const MockFence) }
}

fn mock_buffer(buffer: &dyn Buffer) -> &MockBuffer {
    unsafe { &*(buffer as *const dyn Buffer as *const MockBuffer) }
}

fn mock_command_buffer(cmd: &dyn CommandBuffer) -> &MockCommandBuffer {
    unsafe { &*(cmd as *const dyn CommandBuffer as *const MockCommandBuffer) }
}

fn mock_descriptor_set(set: &dyn DescriptorSet) -> &MockDescriptorSet {
    unsafe { &*(set as *const dyn DescriptorSet as *const MockDescriptorSet) }
}

fn mock_render_pass(render_pass: &dyn RenderPass) -> &MockRenderPass {
    unsafe { &*(render_pass as *const dyn RenderPass as *const MockRenderPass) }
}

fn mock_texture(texture: &dyn Texture) -> &MockTexture {
    unsafe { &*(texture as *const dyn Texture as *const MockTexture) }
}

// ============================================================================
// Mock Buffer
// ============================================================================

pub struct MockBuffer {
    pub id: u64,
    pub size: u64,
    pub usage: BufferUsage,
    gpu: Arc<Mutex<MockGpu>>,
}

impl Buffer for MockBuffer {
    fn update(&self, offset: u64, data: &[u8]) -> Result<()> {
        if offset + data.len() as u64 > self.size {
            return Err(Error::InvalidResource(format!(
                "write of {} bytes at {} exceeds buffer size {}",
                data.len(), offset, self.size
            )));
        }
        let mut gpu = self.gpu.lock().unwrap();
        let in_use: Vec<u64> = gpu
            .pending
            .iter()
            .filter(|p| p.buffers.contains(&self.id))
            .map(|p| p.id)
            .collect();
        for submission in in_use {
            gpu.races.push(format!(
                "buffer {} written while submission {} may still read it",
                self.id, submission
            ));
        }
        gpu.events.push(GpuEvent::BufferWrite { buffer: self.id });
        Ok(())
    }

    fn size(&self) -> u64 {
        self.size
    }
}

// ============================================================================
// Mock Texture / Sampler / Shader
// ============================================================================

pub struct MockTexture {
    pub id: u64,
    pub info: TextureInfo,
}

impl Texture for MockTexture {
    fn info(&self) -> &TextureInfo {
        &self.info
    }
}

pub struct MockSampler {
    pub desc: SamplerDesc,
}

impl Sampler for MockSampler {
    fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

pub struct MockShader {
    pub stage: ShaderStage,
}

impl Shader for MockShader {
    fn stage(&self) -> ShaderStage {
        self.stage
    }
}

// ============================================================================
// Mock RenderPass / Framebuffer
// ============================================================================

pub struct MockRenderPass {
    pub id: u64,
    pub desc: RenderPassDesc,
}

impl RenderPass for MockRenderPass {
    fn color_attachment_count(&self) -> u32 {
        self.desc.color_refs.len() as u32
    }

    fn has_depth_attachment(&self) -> bool {
        self.desc.depth_ref.is_some()
    }
}

pub struct MockFramebuffer {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub layers: u32,
    pub formats: Vec<TextureFormat>,
}

impl Framebuffer for MockFramebuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn layers(&self) -> u32 {
        self.layers
    }

    fn attachment_count(&self) -> u32 {
        self.formats.len() as u32
    }
}

// ============================================================================
// Mock Descriptors
// ============================================================================

pub struct MockDescriptorSetLayout {
    pub bindings: Vec<DescriptorBinding>,
}

impl DescriptorSetLayout for MockDescriptorSetLayout {
    fn bindings(&self) -> &[DescriptorBinding] {
        &self.bindings
    }
}

pub struct MockDescriptorPool {
    max_sets: u32,
    /// Shared with every live set, which gives its slot back on drop
    allocated: Arc<Mutex<u32>>,
    gpu: Arc<Mutex<MockGpu>>,
}

impl DescriptorPool for MockDescriptorPool {
    fn allocate(&self, layout: &Arc<dyn DescriptorSetLayout>) -> Result<Arc<dyn DescriptorSet>> {
        let mut allocated = self.allocated.lock().unwrap();
        if *allocated >= self.max_sets {
            return Err(Error::DescriptorPoolExhausted(format!(
                "all {} sets allocated", self.max_sets
            )));
        }
        *allocated += 1;
        let id = self.gpu.lock().unwrap().alloc_id("descriptor_set");
        Ok(Arc::new(MockDescriptorSet {
            id,
            layout: layout.bindings().to_vec(),
            buffers: Mutex::new(FxHashMap::default()),
            images: Mutex::new(FxHashMap::default()),
            pool_allocated: Arc::clone(&self.allocated),
        }))
    }

    fn allocated_sets(&self) -> u32 {
        *self.allocated.lock().unwrap()
    }

    fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

pub struct MockDescriptorSet {
    pub id: u64,
    pub layout: Vec<DescriptorBinding>,
    /// binding -> buffer id
    pub buffers: Mutex<FxHashMap<u32, u64>>,
    /// binding -> texture id
    pub images: Mutex<FxHashMap<u32, u64>>,
    pool_allocated: Arc<Mutex<u32>>,
}

impl Drop for MockDescriptorSet {
    fn drop(&mut self) {
        if let Ok(mut allocated) = self.pool_allocated.lock() {
            *allocated = allocated.saturating_sub(1);
        }
    }
}

impl MockDescriptorSet {
    fn check_binding(&self, binding: u32) -> Result<()> {
        if self.layout.iter().any(|b| b.binding == binding) {
            Ok(())
        } else {
            Err(Error::InvalidResource(format!("binding {} not in layout", binding)))
        }
    }
}

impl DescriptorSet for MockDescriptorSet {
    fn write_uniform_buffer(&self, binding: u32, buffer: &dyn Buffer, _offset: u64, _range: u64) -> Result<()> {
        self.check_binding(binding)?;
        self.buffers.lock().unwrap().insert(binding, mock_buffer(buffer).id);
        Ok(())
    }

    fn write_combined_image_sampler(&self, binding: u32, texture: &dyn Texture, _sampler: &dyn Sampler) -> Result<()> {
        self.check_binding(binding)?;
        self.images.lock().unwrap().insert(binding, mock_texture(texture).id);
        Ok(())
    }
}

// ============================================================================
// Mock Pipeline
// ============================================================================

pub struct MockPipeline {
    pub desc: PipelineDesc,
}

impl Pipeline for MockPipeline {
    fn label(&self) -> &str {
        &self.desc.label
    }
}

// ============================================================================
// Mock CommandBuffer
// ============================================================================

pub struct MockCommandBuffer {
    pub id: u64,
    pub commands: Vec<String>,
    pub used_buffers: FxHashSet<u64>,
    recording: bool,
    executable: bool,
}

impl MockCommandBuffer {
    fn record(&mut self, command: String) -> Result<()> {
        if !self.recording {
            return Err(Error::BackendError(format!("'{}' recorded outside begin/end", command)));
        }
        self.commands.push(command);
        Ok(())
    }
}

impl CommandBuffer for MockCommandBuffer {
    fn begin(&mut self, _usage: CommandBufferUsage) -> Result<()> {
        self.commands.clear();
        self.used_buffers.clear();
        self.recording = true;
        self.executable = false;
        self.commands.push("begin".to_string());
        Ok(())
    }

    fn end(&mut self) -> Result<()> {
        self.record("end".to_string())?;
        self.recording = false;
        self.executable = true;
        Ok(())
    }

    fn reset(&mut self) -> Result<()> {
        self.commands.clear();
        self.used_buffers.clear();
        self.recording = false;
        self.executable = false;
        Ok(())
    }

    fn begin_render_pass(
        &mut self,
        render_pass: &dyn RenderPass,
        framebuffer: &dyn Framebuffer,
        _render_area: Rect2D,
        clear_values: &[ClearValue],
    ) -> Result<()> {
        let id = mock_render_pass(render_pass).id;
        self.record(format!(
            "begin_render_pass(rp={}, attachments={}, clears={})",
            id, framebuffer.attachment_count(), clear_values.len()
        ))
    }

    fn end_render_pass(&mut self) -> Result<()> {
        self.record("end_render_pass".to_string())
    }

    fn set_viewport(&mut self, viewport: Viewport) -> Result<()> {
        self.record(format!("set_viewport({}x{})", viewport.width, viewport.height))
    }

    fn set_scissor(&mut self, scissor: Rect2D) -> Result<()> {
        self.record(format!(
            "set_scissor({},{},{},{})",
            scissor.x, scissor.y, scissor.width, scissor.height
        ))
    }

    fn bind_pipeline(&mut self, pipeline: &dyn Pipeline) -> Result<()> {
        self.record(format!("bind_pipeline({})", pipeline.label()))
    }

    fn bind_descriptor_set(&mut self, _pipeline: &dyn Pipeline, set: &dyn DescriptorSet) -> Result<()> {
        let set = mock_descriptor_set(set);
        self.used_buffers.extend(set.buffers.lock().unwrap().values().copied());
        self.record(format!("bind_descriptor_set({})", set.id))
    }

    fn push_constants(
        &mut self,
        _pipeline: &dyn Pipeline,
        _stages: ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> Result<()> {
        self.record(format!("push_constants({}, {})", offset, data.len()))
    }

    fn bind_vertex_buffer(&mut self, buffer: &dyn Buffer, _offset: u64) -> Result<()> {
        let id = mock_buffer(buffer).id;
        self.used_buffers.insert(id);
        self.record(format!("bind_vertex_buffer({})", id))
    }

    fn bind_index_buffer(&mut self, buffer: &dyn Buffer, _offset: u64, index_type: IndexType) -> Result<()> {
        let id = mock_buffer(buffer).id;
        self.used_buffers.insert(id);
        self.record(format!("bind_index_buffer({}, {:?})", id, index_type))
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32, _first_vertex: u32, _first_instance: u32) -> Result<()> {
        self.record(format!("draw({}, {})", vertex_count, instance_count))
    }

    fn draw_indexed(
        &mut self,
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        vertex_offset: i32,
        _first_instance: u32,
    ) -> Result<()> {
        self.record(format!(
            "draw_indexed({}, {}, {}, {})",
            index_count, instance_count, first_index, vertex_offset
        ))
    }
}

// ============================================================================
// Mock Semaphore / Fence
// ============================================================================

pub struct MockSemaphore {
    pub id: u64,
}

impl Semaphore for MockSemaphore {}

pub struct MockFence {
    pub id: u64,
    gpu: Arc<Mutex<MockGpu>>,
}

impl Fence for MockFence {
    fn is_signaled(&self) -> Result<bool> {
        Ok(self.gpu.lock().unwrap().signaled_fences.contains(&self.id))
    }
}

// ============================================================================
// Mock Swapchain
// ============================================================================

pub struct MockSwapchain {
    desc: SwapchainDesc,
    images: Vec<Arc<dyn Texture>>,
    next_image: u32,
    gpu: Arc<Mutex<MockGpu>>,
}

impl MockSwapchain {
    fn build_images(gpu: &mut MockGpu, desc: &SwapchainDesc) -> Vec<Arc<dyn Texture>> {
        (0..desc.image_count)
            .map(|_| {
                let id = gpu.alloc_id("swapchain_image");
                Arc::new(MockTexture {
                    id,
                    info: TextureInfo::from_desc(&TextureDesc {
                        width: desc.extent.width,
                        height: desc.extent.height,
                        array_layers: 1,
                        format: desc.surface_format.format,
                        usage: TextureUsage::COLOR_ATTACHMENT,
                    }),
                }) as Arc<dyn Texture>
            })
            .collect()
    }
}

impl Swapchain for MockSwapchain {
    fn acquire_next_image(&mut self, signal: &dyn Semaphore, _timeout_ns: u64) -> Result<AcquireResult> {
        let semaphore = mock_semaphore(signal).id;
        let mut gpu = self.gpu.lock().unwrap();
        let call = gpu.acquire_calls;
        gpu.acquire_calls += 1;

        if gpu.out_of_date_acquires.contains(&call) {
            gpu.events.push(GpuEvent::Acquire { image: None, signal: semaphore });
            return Ok(AcquireResult::OutOfDate);
        }

        let index = self.next_image;
        self.next_image = (self.next_image + 1) % self.desc.image_count;
        gpu.signal_semaphore(semaphore);
        gpu.events.push(GpuEvent::Acquire { image: Some(index), signal: semaphore });
        Ok(AcquireResult::Image { index, suboptimal: false })
    }

    fn present(&mut self, wait: &dyn Semaphore, image_index: u32) -> Result<PresentResult> {
        let semaphore = mock_semaphore(wait).id;
        let mut gpu = self.gpu.lock().unwrap();
        gpu.consume_semaphore(semaphore);
        gpu.events.push(GpuEvent::Present { image: image_index, wait: semaphore });
        Ok(gpu.present_results.pop_front().unwrap_or(PresentResult::Presented))
    }

    fn recreate(&mut self, desc: &SwapchainDesc) -> Result<()> {
        let mut gpu = self.gpu.lock().unwrap();
        self.images = Self::build_images(&mut gpu, desc);
        self.desc = *desc;
        self.next_image = 0;
        gpu.events.push(GpuEvent::SwapchainRecreated {
            image_count: desc.image_count,
            extent: desc.extent,
        });
        Ok(())
    }

    fn image_count(&self) -> u32 {
        self.desc.image_count
    }

    fn image(&self, index: u32) -> Result<Arc<dyn Texture>> {
        self.images
            .get(index as usize)
            .cloned()
            .ok_or_else(|| Error::InvalidResource(format!("no swapchain image {}", index)))
    }

    fn extent(&self) -> Extent2D {
        self.desc.extent
    }

    fn format(&self) -> TextureFormat {
        self.desc.surface_format.format
    }

    fn present_mode(&self) -> PresentMode {
        self.desc.present_mode
    }
}

// ============================================================================
// Mock GraphicsDevice
// ============================================================================

pub struct MockGraphicsDevice {
    gpu: Arc<Mutex<MockGpu>>,
    depth_format: TextureFormat,
}

impl MockGraphicsDevice {
    /// Surface with 2..=3 images, 800x600, FIFO + MAILBOX
    pub fn new() -> Self {
        Self::with_capabilities(Self::default_capabilities())
    }

    pub fn with_capabilities(capabilities: SurfaceCapabilities) -> Self {
        Self {
            gpu: Arc::new(Mutex::new(MockGpu::new(capabilities))),
            depth_format: TextureFormat::D32_SFLOAT,
        }
    }

    pub fn default_capabilities() -> SurfaceCapabilities {
        SurfaceCapabilities {
            min_image_count: 2,
            max_image_count: 3,
            current_extent: Some(Extent2D::new(800, 600)),
            min_extent: Extent2D::new(1, 1),
            max_extent: Extent2D::new(4096, 4096),
            formats: vec![
                SurfaceFormat { format: TextureFormat::R8G8B8A8_UNORM, color_space: ColorSpace::SrgbNonLinear },
                SurfaceFormat { format: TextureFormat::B8G8R8A8_UNORM, color_space: ColorSpace::SrgbNonLinear },
            ],
            present_modes: vec![PresentMode::Fifo, PresentMode::Mailbox],
        }
    }

    fn gpu(&self) -> MutexGuard<'_, MockGpu> {
        self.gpu.lock().unwrap()
    }

    // ===== INSPECTION =====

    pub fn events(&self) -> Vec<GpuEvent> {
        self.gpu().events.clone()
    }

    pub fn clear_events(&self) {
        self.gpu().events.clear();
    }

    /// Submit events only, in submission order
    pub fn submissions(&self) -> Vec<GpuEvent> {
        self.gpu()
            .events
            .iter()
            .filter(|e| matches!(e, GpuEvent::Submit { .. }))
            .cloned()
            .collect()
    }

    pub fn violations(&self) -> Vec<String> {
        self.gpu().violations.clone()
    }

    pub fn races(&self) -> Vec<String> {
        self.gpu().races.clone()
    }

    pub fn max_fences_in_flight(&self) -> usize {
        self.gpu().max_fences_in_flight
    }

    /// Number of objects of `kind` created so far
    /// ("buffer:uniform", "texture", "descriptor_set", "framebuffer", ...)
    pub fn created(&self, kind: &str) -> usize {
        self.gpu().created.get(kind).copied().unwrap_or(0)
    }

    pub fn set_capabilities(&self, capabilities: SurfaceCapabilities) {
        self.gpu().capabilities = capabilities;
    }

    // ===== FAULT INJECTION =====

    pub fn set_skip_fence_waits(&self, skip: bool) {
        self.gpu().skip_fence_waits = skip;
    }

    pub fn set_hang_fence_waits(&self, hang: bool) {
        self.gpu().hang_fence_waits = hang;
    }

    /// Make the `call`-th acquire (0-based) report out-of-date
    pub fn fail_acquire_at(&self, call: usize) {
        self.gpu().out_of_date_acquires.insert(call);
    }

    pub fn queue_present_result(&self, result: PresentResult) {
        self.gpu().present_results.push_back(result);
    }
}

impl GraphicsDevice for MockGraphicsDevice {
    fn surface_capabilities(&self) -> Result<SurfaceCapabilities> {
        Ok(self.gpu().capabilities.clone())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> Result<Box<dyn Swapchain>> {
        let mut gpu = self.gpu();
        let caps = gpu.capabilities.clone();
        if desc.image_count < caps.min_image_count
            || (caps.max_image_count != 0 && desc.image_count > caps.max_image_count)
        {
            gpu.violations.push(format!("swapchain image count {} outside capabilities", desc.image_count));
        }
        gpu.alloc_id("swapchain");
        let images = MockSwapchain::build_images(&mut gpu, desc);
        gpu.events.push(GpuEvent::SwapchainCreated {
            image_count: desc.image_count,
            extent: desc.extent,
        });
        Ok(Box::new(MockSwapchain {
            desc: *desc,
            images,
            next_image: 0,
            gpu: self.gpu.clone(),
        }))
    }

    fn create_buffer(&self, desc: &BufferDesc) -> Result<Arc<dyn Buffer>> {
        let kind = match desc.usage {
            BufferUsage::Vertex => "buffer:vertex",
            BufferUsage::Index => "buffer:index",
            BufferUsage::Uniform => "buffer:uniform",
        };
        let id = self.gpu().alloc_id(kind);
        Ok(Arc::new(MockBuffer {
            id,
            size: desc.size,
            usage: desc.usage,
            gpu: self.gpu.clone(),
        }))
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Arc<dyn Texture>> {
        if desc.width == 0 || desc.height == 0 || desc.array_layers == 0 {
            return Err(Error::InvalidResource("zero-sized texture".to_string()));
        }
        let id = self.gpu().alloc_id("texture");
        Ok(Arc::new(MockTexture { id, info: TextureInfo::from_desc(desc) }))
    }

    fn create_sampler(&self, desc: &SamplerDesc) -> Result<Arc<dyn Sampler>> {
        self.gpu().alloc_id("sampler");
        Ok(Arc::new(MockSampler { desc: desc.clone() }))
    }

    fn create_shader(&self, desc: &ShaderDesc) -> Result<Arc<dyn Shader>> {
        self.gpu().alloc_id("shader");
        Ok(Arc::new(MockShader { stage: desc.stage }))
    }

    fn supported_depth_format(&self) -> Result<TextureFormat> {
        Ok(self.depth_format)
    }

    fn create_render_pass(&self, desc: &RenderPassDesc) -> Result<Arc<dyn RenderPass>> {
        let id = self.gpu().alloc_id("render_pass");
        Ok(Arc::new(MockRenderPass { id, desc: desc.clone() }))
    }

    fn create_framebuffer(&self, desc: &FramebufferDesc) -> Result<Arc<dyn Framebuffer>> {
        let id = self.gpu().alloc_id("framebuffer");
        Ok(Arc::new(MockFramebuffer {
            id,
            width: desc.width,
            height: desc.height,
            layers: desc.layers,
            formats: desc.attachments.iter().map(|a| a.info().format).collect(),
        }))
    }

    fn create_descriptor_set_layout(&self, desc: &DescriptorSetLayoutDesc) -> Result<Arc<dyn DescriptorSetLayout>> {
        self.gpu().alloc_id("descriptor_set_layout");
        Ok(Arc::new(MockDescriptorSetLayout { bindings: desc.bindings.clone() }))
    }

    fn create_descriptor_pool(&self, desc: &DescriptorPoolDesc) -> Result<Arc<dyn DescriptorPool>> {
        self.gpu().alloc_id("descriptor_pool");
        Ok(Arc::new(MockDescriptorPool {
            max_sets: desc.max_sets,
            allocated: Arc::new(Mutex::new(0)),
            gpu: self.gpu.clone(),
        }))
    }

    fn create_pipeline(&self, desc: &PipelineDesc) -> Result<Arc<dyn Pipeline>> {
        self.gpu().alloc_id("pipeline");
        Ok(Arc::new(MockPipeline { desc: desc.clone() }))
    }

    fn create_command_buffer(&self) -> Result<Box<dyn CommandBuffer>> {
        let id = self.gpu().alloc_id("command_buffer");
        Ok(Box::new(MockCommandBuffer {
            id,
            commands: Vec::new(),
            used_buffers: FxHashSet::default(),
            recording: false,
            executable: false,
        }))
    }

    fn create_semaphore(&self) -> Result<Arc<dyn Semaphore>> {
        let id = self.gpu().alloc_id("semaphore");
        Ok(Arc::new(MockSemaphore { id }))
    }

    fn create_fence(&self, signaled: bool) -> Result<Arc<dyn Fence>> {
        let mut gpu = self.gpu();
        let id = gpu.alloc_id("fence");
        if signaled {
            gpu.signaled_fences.insert(id);
        }
        Ok(Arc::new(MockFence { id, gpu: self.gpu.clone() }))
    }

    fn wait_for_fence(&self, fence: &dyn Fence, _timeout_ns: u64) -> Result<FenceWait> {
        let id = mock_fence(fence).id;
        let mut gpu = self.gpu();
        if gpu.skip_fence_waits {
            return Ok(FenceWait::Signaled);
        }
        gpu.events.push(GpuEvent::FenceWait { fence: id });
        if gpu.signaled_fences.contains(&id) {
            return Ok(FenceWait::Signaled);
        }
        let pending = gpu.pending.iter().any(|p| p.fence == Some(id));
        if !pending || gpu.hang_fence_waits {
            return Ok(FenceWait::TimedOut);
        }
        gpu.retire_through(id);
        Ok(FenceWait::Signaled)
    }

    fn reset_fence(&self, fence: &dyn Fence) -> Result<()> {
        let id = mock_fence(fence).id;
        let mut gpu = self.gpu();
        gpu.events.push(GpuEvent::FenceReset { fence: id });
        if gpu.pending.iter().any(|p| p.fence == Some(id)) {
            gpu.violations.push(format!("fence {} reset while its work is pending", id));
        }
        gpu.signaled_fences.remove(&id);
        Ok(())
    }

    fn submit(&self, info: &SubmitInfo) -> Result<()> {
        let mut gpu = self.gpu();
        let submission = gpu.alloc_id("submission");

        let mut command_buffers = Vec::new();
        let mut commands = Vec::new();
        let mut buffers = FxHashSet::default();
        for cmd in &info.command_buffers {
            let cmd = mock_command_buffer(*cmd);
            if !cmd.executable {
                gpu.violations.push(format!("command buffer {} submitted while not executable", cmd.id));
            }
            command_buffers.push(cmd.id);
            commands.extend(cmd.commands.iter().cloned());
            buffers.extend(cmd.used_buffers.iter().copied());
        }

        let waits: Vec<u64> = info.wait_semaphores.iter().map(|w| mock_semaphore(w.semaphore).id).collect();
        for &semaphore in &waits {
            gpu.consume_semaphore(semaphore);
        }
        let signals: Vec<u64> = info.signal_semaphores.iter().map(|s| mock_semaphore(*s).id).collect();
        for &semaphore in &signals {
            gpu.signal_semaphore(semaphore);
        }

        let fence = info.fence.map(|f| mock_fence(f).id);
        if let Some(f) = fence {
            if gpu.signaled_fences.contains(&f) {
                gpu.violations.push(format!("fence {} submitted without reset", f));
            }
        }

        gpu.events.push(GpuEvent::Submit {
            submission,
            command_buffers,
            commands,
            waits,
            signals,
            fence,
        });
        gpu.pending.push_back(PendingSubmission { id: submission, fence, buffers });
        let in_flight = gpu.fences_in_flight();
        gpu.max_fences_in_flight = gpu.max_fences_in_flight.max(in_flight);
        Ok(())
    }

    fn wait_idle(&self) -> Result<()> {
        let mut gpu = self.gpu();
        gpu.retire_all();
        gpu.events.push(GpuEvent::WaitIdle);
        Ok(())
    }
}

#[cfg(test)]
#[path = "mock_graphics_device_tests.rs"]
mod tests;
