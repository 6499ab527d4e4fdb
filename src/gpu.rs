use std::fmt;

use glow::HasContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    fn gl_enum(self) -> u32 {
        match self {
            ShaderStage::Vertex => glow::VERTEX_SHADER,
            ShaderStage::Fragment => glow::FRAGMENT_SHADER,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Handle to a current OpenGL context.
///
/// Every drawing and compilation operation receives the context explicitly
/// instead of relying on whichever context happens to be bound to the thread.
/// Lookups that may legitimately miss (uniforms, attributes optimised out by
/// the driver) return `None` and callers decide what skipping means.
pub trait Gpu {
    type Shader: Copy + fmt::Debug + PartialEq;
    type Program: Copy + fmt::Debug + PartialEq;
    type VertexArray: Copy + fmt::Debug;
    type Buffer: Copy + fmt::Debug;
    type UniformLocation: fmt::Debug;

    fn alloc_vertex_array(&self) -> Result<Self::VertexArray, String>;
    fn alloc_buffer(&self) -> Result<Self::Buffer, String>;
    /// Uploads `vertices` into `buffer` with static-draw usage.
    fn upload_vertices(&self, buffer: Self::Buffer, vertices: &[f32]);

    fn new_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn compile(&self, shader: Self::Shader, source: &str);
    fn is_compiled(&self, shader: Self::Shader) -> bool;
    fn shader_log(&self, shader: Self::Shader) -> String;
    fn drop_shader(&self, shader: Self::Shader);

    fn new_program(&self) -> Result<Self::Program, String>;
    fn attach(&self, program: Self::Program, shader: Self::Shader);
    fn detach(&self, program: Self::Program, shader: Self::Shader);
    fn link(&self, program: Self::Program);
    fn is_linked(&self, program: Self::Program) -> bool;
    fn program_log(&self, program: Self::Program) -> String;
    fn drop_program(&self, program: Self::Program);

    fn uniform(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation>;
    fn set_float(&self, program: Self::Program, location: &Self::UniformLocation, x: f32);
    fn set_float2(&self, program: Self::Program, location: &Self::UniformLocation, x: f32, y: f32);
    fn attribute(&self, program: Self::Program, name: &str) -> Option<u32>;
    /// Points float attribute `index` at the bound array buffer and enables it.
    fn bind_attribute(&self, index: u32, components: i32, stride: i32, offset: i32);

    fn bind_vao(&self, vertex_array: Option<Self::VertexArray>);
    fn bind_vertex_buffer(&self, buffer: Option<Self::Buffer>);
    fn activate(&self, program: Option<Self::Program>);
    fn draw_strip(&self, count: i32);
    fn clear_frame(&self, color: [f32; 4]);
    fn enable_depth_test(&self);
}

// Every method assumes the context is current on the calling thread and that
// handles passed in were created by this same context.
impl Gpu for glow::Context {
    type Shader = glow::Shader;
    type Program = glow::Program;
    type VertexArray = glow::VertexArray;
    type Buffer = glow::Buffer;
    type UniformLocation = glow::UniformLocation;

    fn alloc_vertex_array(&self) -> Result<Self::VertexArray, String> {
        // SAFETY: object creation only needs a current context.
        unsafe { self.create_vertex_array() }
    }

    fn alloc_buffer(&self) -> Result<Self::Buffer, String> {
        // SAFETY: object creation only needs a current context.
        unsafe { self.create_buffer() }
    }

    fn upload_vertices(&self, buffer: Self::Buffer, vertices: &[f32]) {
        // SAFETY: `buffer` is a live buffer name; the upload copies exactly
        // `vertices.len() * 4` bytes out of a borrowed slice, and the
        // ARRAY_BUFFER binding is restored to none afterwards.
        unsafe {
            self.bind_buffer(glow::ARRAY_BUFFER, Some(buffer));
            self.buffer_data_u8_slice(
                glow::ARRAY_BUFFER,
                bytemuck::cast_slice(vertices),
                glow::STATIC_DRAW,
            );
            self.bind_buffer(glow::ARRAY_BUFFER, None);
        }
    }

    fn new_shader(&self, stage: ShaderStage) -> Result<Self::Shader, String> {
        // SAFETY: `gl_enum` only yields valid shader type enums.
        unsafe { self.create_shader(stage.gl_enum()) }
    }

    fn compile(&self, shader: Self::Shader, source: &str) {
        // SAFETY: glow passes the source with an explicit length, so it need
        // not be NUL-terminated; compile errors surface through the status query.
        unsafe {
            self.shader_source(shader, source);
            self.compile_shader(shader);
        }
    }

    fn is_compiled(&self, shader: Self::Shader) -> bool {
        // SAFETY: status query on a live shader name.
        unsafe { self.get_shader_compile_status(shader) }
    }

    fn shader_log(&self, shader: Self::Shader) -> String {
        // SAFETY: glow sizes the log buffer from INFO_LOG_LENGTH.
        unsafe { self.get_shader_info_log(shader) }
    }

    fn drop_shader(&self, shader: Self::Shader) {
        // SAFETY: deleting a shader still attached somewhere only flags it.
        unsafe { self.delete_shader(shader) }
    }

    fn new_program(&self) -> Result<Self::Program, String> {
        // SAFETY: object creation only needs a current context.
        unsafe { self.create_program() }
    }

    fn attach(&self, program: Self::Program, shader: Self::Shader) {
        // SAFETY: both names are live; attaching twice is a GL error, not UB.
        unsafe { self.attach_shader(program, shader) }
    }

    fn detach(&self, program: Self::Program, shader: Self::Shader) {
        // SAFETY: detaching leaves the shader object itself alive.
        unsafe { self.detach_shader(program, shader) }
    }

    fn link(&self, program: Self::Program) {
        // SAFETY: link failures surface through the status query.
        unsafe { self.link_program(program) }
    }

    fn is_linked(&self, program: Self::Program) -> bool {
        // SAFETY: status query on a live program name.
        unsafe { self.get_program_link_status(program) }
    }

    fn program_log(&self, program: Self::Program) -> String {
        // SAFETY: glow sizes the log buffer from INFO_LOG_LENGTH.
        unsafe { self.get_program_info_log(program) }
    }

    fn drop_program(&self, program: Self::Program) {
        // SAFETY: callers never use `program` again after dropping it.
        unsafe { self.delete_program(program) }
    }

    fn uniform(&self, program: Self::Program, name: &str) -> Option<Self::UniformLocation> {
        // SAFETY: lookup on a linked program; a miss comes back as `None`.
        unsafe { self.get_uniform_location(program, name) }
    }

    fn set_float(&self, program: Self::Program, location: &Self::UniformLocation, x: f32) {
        // SAFETY: `location` was looked up on `program`, which is bound first
        // because glUniform* writes to the program in use.
        unsafe {
            self.use_program(Some(program));
            self.uniform_1_f32(Some(location), x);
        }
    }

    fn set_float2(&self, program: Self::Program, location: &Self::UniformLocation, x: f32, y: f32) {
        // SAFETY: as for `set_float`; the location must name a vec2 uniform.
        unsafe {
            self.use_program(Some(program));
            self.uniform_2_f32(Some(location), x, y);
        }
    }

    fn attribute(&self, program: Self::Program, name: &str) -> Option<u32> {
        // SAFETY: lookup on a linked program; a miss comes back as `None`.
        unsafe { self.get_attrib_location(program, name) }
    }

    fn bind_attribute(&self, index: u32, components: i32, stride: i32, offset: i32) {
        // SAFETY: a vertex array and an ARRAY_BUFFER must be bound, so `offset`
        // is a byte offset into that buffer rather than a client pointer.
        unsafe {
            self.vertex_attrib_pointer_f32(index, components, glow::FLOAT, false, stride, offset);
            self.enable_vertex_attrib_array(index);
        }
    }

    fn bind_vao(&self, vertex_array: Option<Self::VertexArray>) {
        // SAFETY: binding a live name or none.
        unsafe { self.bind_vertex_array(vertex_array) }
    }

    fn bind_vertex_buffer(&self, buffer: Option<Self::Buffer>) {
        // SAFETY: binding a live name or none.
        unsafe { self.bind_buffer(glow::ARRAY_BUFFER, buffer) }
    }

    fn activate(&self, program: Option<Self::Program>) {
        // SAFETY: binding a linked program or none.
        unsafe { self.use_program(program) }
    }

    fn draw_strip(&self, count: i32) {
        // SAFETY: `count` never exceeds the vertices uploaded to the bound
        // buffer, so enabled attributes are never read out of range.
        unsafe { self.draw_arrays(glow::TRIANGLE_STRIP, 0, count) }
    }

    fn clear_frame(&self, [r, g, b, a]: [f32; 4]) {
        // SAFETY: clears only touch the current framebuffer.
        unsafe {
            self.clear_color(r, g, b, a);
            self.clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT | glow::STENCIL_BUFFER_BIT);
        }
    }

    fn enable_depth_test(&self) {
        // SAFETY: global state toggles with valid enums.
        unsafe {
            self.enable(glow::DEPTH_TEST);
            self.depth_func(glow::LESS);
        }
    }
}
