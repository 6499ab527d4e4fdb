use crate::data::{self, FrameInputs};
use crate::error::ShaderError;
use crate::gpu::{Gpu, ShaderStage};
use crate::{GLOBAL_TIME_UNIFORM, POSITION_ATTRIBUTE, RESOLUTION_UNIFORM};

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

const VERTEX_SHADER_SOURCE: &str = r#"#version 410 core
in vec3 in_pos;
void main()
{
    gl_Position = vec4(in_pos.x, in_pos.y, in_pos.z, 1.0);
}
"#;

const FLOATS_PER_VERTEX: i32 = 5;
const QUAD_VERTEX_COUNT: i32 = 4;

/// Full-screen quad as a triangle strip, interleaved position (xyz) + uv.
const QUAD_VERTICES: [f32; 20] = [
    -1.0, -1.0, 0.5, 0.0, 0.0, //
    -1.0, 1.0, 0.5, 0.0, 1.0, //
    1.0, -1.0, 0.5, 1.0, 0.0, //
    1.0, 1.0, 0.5, 1.0, 1.0,
];

/// Whether a named shader input was found on the active program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Applied,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reload {
    Unchanged,
    Reloaded,
}

/// The fixed vertex stage, the hot-reloaded fragment stage and the quad they draw.
///
/// The unit never holds on to a GL context; every call takes one explicitly.
/// `program` always names the last program that linked successfully.
pub struct ShaderUnit<G: Gpu> {
    fragment_path: PathBuf,
    fragment_source: String,
    last_modified: Option<SystemTime>,
    vertex_shader: G::Shader,
    program: G::Program,
    vertex_array: G::VertexArray,
    vertex_buffer: G::Buffer,
}

impl<G: Gpu> ShaderUnit<G> {
    pub fn new(gl: &G, fragment_path: impl Into<PathBuf>) -> Result<Self, ShaderError> {
        let fragment_path = fragment_path.into();

        let vertex_array = gl.alloc_vertex_array().map_err(|reason| ShaderError::Allocation {
            what: "vertex array",
            reason,
        })?;
        let vertex_buffer = gl.alloc_buffer().map_err(|reason| ShaderError::Allocation {
            what: "vertex buffer",
            reason,
        })?;
        gl.upload_vertices(vertex_buffer, &QUAD_VERTICES);
        gl.bind_vao(Some(vertex_array));

        let vertex_shader = compile_shader(gl, ShaderStage::Vertex, VERTEX_SHADER_SOURCE)?;

        // Stat before reading so an edit landing in between is picked up by the next check.
        let last_modified = modified_time(&fragment_path).ok();
        let fragment_source = load_fragment(&fragment_path)?;
        let program = build_program(gl, vertex_shader, &fragment_source)?;

        log::info!("Loaded fragment shader {:?}", fragment_path);
        data::report_uniforms(&fragment_source, &[GLOBAL_TIME_UNIFORM, RESOLUTION_UNIFORM]);

        Ok(Self {
            fragment_path,
            fragment_source,
            last_modified,
            vertex_shader,
            program,
            vertex_array,
            vertex_buffer,
        })
    }

    pub fn fragment_path(&self) -> &Path {
        &self.fragment_path
    }

    /// Source text of the currently linked fragment stage.
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    pub fn program(&self) -> G::Program {
        self.program
    }

    /// Recompile the fragment stage if the file's mtime moved since the last look.
    ///
    /// The new mtime is remembered even when the rebuild fails, so a broken
    /// file is only retried after it changes again. A file that cannot be
    /// opened leaves the cached mtime alone and is retried on the next check.
    pub fn reload_if_modified(&mut self, gl: &G) -> Result<Reload, ShaderError> {
        let modified = modified_time(&self.fragment_path)?;
        if self.last_modified == Some(modified) {
            return Ok(Reload::Unchanged);
        }
        self.last_modified = Some(modified);
        self.reload_fragment(gl)?;
        Ok(Reload::Reloaded)
    }

    fn reload_fragment(&mut self, gl: &G) -> Result<(), ShaderError> {
        let source = load_fragment(&self.fragment_path)?;
        let program = build_program(gl, self.vertex_shader, &source)?;

        let previous = std::mem::replace(&mut self.program, program);
        gl.drop_program(previous);

        data::report_uniforms(&source, &[GLOBAL_TIME_UNIFORM, RESOLUTION_UNIFORM]);
        self.fragment_source = source;
        Ok(())
    }

    pub fn set_uniform_float(&self, gl: &G, name: &str, value: f32) -> Binding {
        match gl.uniform(self.program, name) {
            Some(location) => {
                gl.set_float(self.program, &location, value);
                Binding::Applied
            }
            None => Binding::Skipped,
        }
    }

    pub fn set_uniform_float2(&self, gl: &G, name: &str, x: f32, y: f32) -> Binding {
        match gl.uniform(self.program, name) {
            Some(location) => {
                gl.set_float2(self.program, &location, x, y);
                Binding::Applied
            }
            None => Binding::Skipped,
        }
    }

    pub fn apply(&self, gl: &G, inputs: &FrameInputs) {
        self.set_uniform_float(gl, GLOBAL_TIME_UNIFORM, inputs.global_time);
        let [width, height] = inputs.resolution;
        self.set_uniform_float2(gl, RESOLUTION_UNIFORM, width, height);
    }

    /// Draw the quad with the active program. Reports whether `in_pos` was bound.
    pub fn draw(&self, gl: &G) -> Binding {
        gl.bind_vao(Some(self.vertex_array));
        gl.activate(Some(self.program));
        gl.bind_vertex_buffer(Some(self.vertex_buffer));

        let position = match gl.attribute(self.program, POSITION_ATTRIBUTE) {
            Some(index) => {
                gl.bind_attribute(index, 3, FLOATS_PER_VERTEX * 4, 0);
                Binding::Applied
            }
            None => Binding::Skipped,
        };

        gl.draw_strip(QUAD_VERTEX_COUNT);
        gl.activate(None);
        position
    }
}

/// Open the file and stat the handle, so a file that exists but cannot be
/// read fails here, before the cached mtime is touched.
fn modified_time(path: &Path) -> Result<SystemTime, ShaderError> {
    File::open(path)
        .and_then(|file| file.metadata())
        .and_then(|meta| meta.modified())
        .map_err(|source| ShaderError::FileAccess {
            path: path.to_path_buf(),
            source,
        })
}

fn load_fragment(path: &Path) -> Result<String, ShaderError> {
    let bytes = std::fs::read(path).map_err(|source| ShaderError::Load {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn compile_shader<G: Gpu>(gl: &G, stage: ShaderStage, source: &str) -> Result<G::Shader, ShaderError> {
    let shader = gl.new_shader(stage).map_err(|reason| ShaderError::Allocation {
        what: "shader",
        reason,
    })?;
    gl.compile(shader, source);

    if !gl.is_compiled(shader) {
        let log = diagnostic(gl.shader_log(shader));
        gl.drop_shader(shader);
        return Err(ShaderError::Compile { stage, log });
    }
    Ok(shader)
}

/// Link the shared vertex stage with a freshly compiled fragment stage.
///
/// On failure every object created here is deleted again; the vertex stage is
/// only detached.
fn build_program<G: Gpu>(gl: &G, vertex_shader: G::Shader, fragment_source: &str) -> Result<G::Program, ShaderError> {
    let fragment_shader = compile_shader(gl, ShaderStage::Fragment, fragment_source)?;

    let program = match gl.new_program() {
        Ok(program) => program,
        Err(reason) => {
            gl.drop_shader(fragment_shader);
            return Err(ShaderError::Allocation { what: "program", reason });
        }
    };

    gl.attach(program, vertex_shader);
    gl.attach(program, fragment_shader);
    gl.link(program);

    let linked = gl.is_linked(program);
    let log = if linked { None } else { Some(diagnostic(gl.program_log(program))) };

    gl.detach(program, vertex_shader);
    gl.detach(program, fragment_shader);
    gl.drop_shader(fragment_shader);

    match log {
        None => Ok(program),
        Some(log) => {
            gl.drop_program(program);
            Err(ShaderError::Link { log })
        }
    }
}

fn diagnostic(log: String) -> String {
    if log.trim().is_empty() {
        "driver reported no diagnostics".to_string()
    } else {
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::fake::FakeGpu;

    use std::fs::{self, File};
    use std::time::Duration;

    const RED: &str = "#version 410 core\nout vec4 color;\nvoid main(){color=vec4(1,0,0,1);}\n";
    const ANIMATED: &str = "#version 410 core\nuniform float fGlobalTime;\nuniform vec2 v2Resolution;\nout vec4 color;\nvoid main(){color=vec4(sin(fGlobalTime),0,0,1);}\n";
    const BROKEN: &str = "#version 410 core\nvoid main(){color=vec4(1,0,0,1);\n";
    const NO_MAIN: &str = "#version 410 core\nout vec4 color;\n";

    fn write_shader(path: &Path, source: &str, secs: u64) {
        fs::write(path, source).unwrap();
        touch(path, secs);
    }

    fn touch(path: &Path, secs: u64) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn setup(source: &str) -> (tempfile::TempDir, PathBuf, FakeGpu, ShaderUnit<FakeGpu>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shader.frag");
        write_shader(&path, source, 1_000);
        let gl = FakeGpu::default();
        let unit = ShaderUnit::new(&gl, &path).unwrap();
        (dir, path, gl, unit)
    }

    #[test]
    fn construction_uploads_quad_and_links() {
        let (_dir, _path, gl, unit) = setup(RED);
        assert_eq!(gl.uploaded(), QUAD_VERTICES.to_vec());
        assert_eq!(gl.compile_count(ShaderStage::Vertex), 1);
        assert_eq!(gl.compile_count(ShaderStage::Fragment), 1);
        assert_eq!(unit.fragment_source(), RED);
    }

    #[test]
    fn unchanged_mtime_does_nothing() {
        let (_dir, _path, gl, mut unit) = setup(RED);
        assert_eq!(unit.reload_if_modified(&gl).unwrap(), Reload::Unchanged);
        assert_eq!(unit.reload_if_modified(&gl).unwrap(), Reload::Unchanged);
        assert_eq!(gl.compile_count(ShaderStage::Fragment), 1);
    }

    #[test]
    fn modified_file_replaces_program() {
        let (_dir, path, gl, mut unit) = setup(RED);
        let first = unit.program();

        write_shader(&path, ANIMATED, 2_000);
        assert_eq!(unit.reload_if_modified(&gl).unwrap(), Reload::Reloaded);

        let second = unit.program();
        assert_ne!(first, second);
        assert_eq!(gl.deleted_programs(), vec![first]);
        assert_eq!(unit.set_uniform_float(&gl, GLOBAL_TIME_UNIFORM, 2.5), Binding::Applied);
        assert_eq!(gl.uniform_value(second, GLOBAL_TIME_UNIFORM), Some(vec![2.5]));
        assert_eq!(unit.fragment_source(), ANIMATED);
    }

    #[test]
    fn vertex_stage_is_compiled_once() {
        let (_dir, path, gl, mut unit) = setup(RED);
        for secs in [2_000, 3_000, 4_000] {
            touch(&path, secs);
            unit.reload_if_modified(&gl).unwrap();
        }
        assert_eq!(gl.compile_count(ShaderStage::Vertex), 1);
        assert_eq!(gl.compile_count(ShaderStage::Fragment), 4);
    }

    #[test]
    fn intermediate_fragment_objects_are_deleted() {
        let (_dir, path, gl, mut unit) = setup(RED);
        touch(&path, 2_000);
        unit.reload_if_modified(&gl).unwrap();
        // One fragment shader per successful build; the vertex shader survives.
        assert_eq!(gl.deleted_shaders().len(), 2);
    }

    #[test]
    fn compile_failure_keeps_previous_program() {
        let (_dir, path, gl, mut unit) = setup(RED);
        let before = unit.program();

        write_shader(&path, BROKEN, 2_000);
        let err = unit.reload_if_modified(&gl).unwrap_err();
        assert!(matches!(err, ShaderError::Compile { stage: ShaderStage::Fragment, .. }));
        assert_eq!(unit.program(), before);
        assert_eq!(unit.fragment_source(), RED);

        let attempts = gl.compile_count(ShaderStage::Fragment);
        for _ in 0..5 {
            assert_eq!(unit.reload_if_modified(&gl).unwrap(), Reload::Unchanged);
        }
        assert_eq!(gl.compile_count(ShaderStage::Fragment), attempts);
        assert!(gl.deleted_programs().is_empty());
    }

    #[test]
    fn compile_failure_deletes_the_failed_shader() {
        let (_dir, path, gl, mut unit) = setup(RED);

        write_shader(&path, BROKEN, 2_000);
        assert!(unit.reload_if_modified(&gl).is_err());

        let fragments = gl.created_shaders(ShaderStage::Fragment);
        assert_eq!(fragments.len(), 2);
        assert!(gl.deleted_shaders().contains(&fragments[1]));
        // No program was created for the failed build.
        assert_eq!(gl.created_programs(), vec![unit.program()]);

        let vertex = gl.created_shaders(ShaderStage::Vertex);
        assert_eq!(vertex.len(), 1);
        assert!(!gl.deleted_shaders().contains(&vertex[0]));
    }

    #[test]
    fn link_failure_keeps_previous_program() {
        let (_dir, path, gl, mut unit) = setup(RED);
        let before = unit.program();

        write_shader(&path, NO_MAIN, 2_000);
        let err = unit.reload_if_modified(&gl).unwrap_err();
        match err {
            ShaderError::Link { log } => assert!(!log.is_empty()),
            other => panic!("expected link error, got {other:?}"),
        }
        assert_eq!(unit.program(), before);
        // The half-built program is discarded, not the live one.
        assert!(!gl.deleted_programs().contains(&before));
        let programs = gl.created_programs();
        assert_eq!(programs.len(), 2);
        assert_eq!(gl.deleted_programs(), vec![programs[1]]);

        let fragments = gl.created_shaders(ShaderStage::Fragment);
        assert_eq!(fragments.len(), 2);
        assert!(gl.deleted_shaders().contains(&fragments[1]));

        let vertex = gl.created_shaders(ShaderStage::Vertex);
        assert!(!gl.deleted_shaders().contains(&vertex[0]));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_file_is_retried_once_readable() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, path, gl, mut unit) = setup(RED);
        let before = unit.program();

        write_shader(&path, ANIMATED, 5_000);
        fs::set_permissions(&path, fs::Permissions::from_mode(0o000)).unwrap();
        if fs::read(&path).is_ok() {
            // Permission bits do not apply to this user (root).
            return;
        }

        let err = unit.reload_if_modified(&gl).unwrap_err();
        assert!(matches!(err, ShaderError::FileAccess { .. }));
        assert_eq!(unit.program(), before);
        assert_eq!(gl.compile_count(ShaderStage::Fragment), 1);

        // chmod leaves the mtime alone; the change must still be picked up.
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(unit.reload_if_modified(&gl).unwrap(), Reload::Reloaded);
        assert_eq!(unit.fragment_source(), ANIMATED);
        assert_ne!(unit.program(), before);
    }

    #[test]
    fn broken_file_recovers_after_fix() {
        let (_dir, path, gl, mut unit) = setup(RED);
        write_shader(&path, BROKEN, 2_000);
        assert!(unit.reload_if_modified(&gl).is_err());

        write_shader(&path, ANIMATED, 3_000);
        assert_eq!(unit.reload_if_modified(&gl).unwrap(), Reload::Reloaded);
        assert_eq!(unit.fragment_source(), ANIMATED);
    }

    #[test]
    fn missing_uniforms_are_skipped() {
        let (_dir, _path, gl, unit) = setup(RED);
        assert_eq!(unit.set_uniform_float(&gl, GLOBAL_TIME_UNIFORM, 1.0), Binding::Skipped);
        assert_eq!(unit.set_uniform_float2(&gl, RESOLUTION_UNIFORM, 800.0, 600.0), Binding::Skipped);
        assert_eq!(gl.uniform_writes(), 0);
        assert_eq!(unit.draw(&gl), Binding::Applied);
        assert_eq!(gl.draws().len(), 1);
    }

    #[test]
    fn apply_feeds_time_and_resolution() {
        let (_dir, _path, gl, unit) = setup(ANIMATED);
        unit.apply(&gl, &FrameInputs { global_time: 4.0, resolution: [800.0, 600.0] });
        assert_eq!(gl.uniform_value(unit.program(), GLOBAL_TIME_UNIFORM), Some(vec![4.0]));
        assert_eq!(gl.uniform_value(unit.program(), RESOLUTION_UNIFORM), Some(vec![800.0, 600.0]));
    }

    #[test]
    fn absent_position_attribute_is_skipped() {
        let (_dir, _path, gl, unit) = setup(RED);
        gl.hide(POSITION_ATTRIBUTE);

        assert_eq!(unit.draw(&gl), Binding::Skipped);
        let draws = gl.draws();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].position, None);
        assert_eq!(draws[0].program, Some(unit.program()));
        assert_eq!(draws[0].count, 4);
        assert_eq!(draws[0].vertex_array, gl.created_vertex_arrays().first().copied());
        assert_eq!(draws[0].buffer, gl.upload_target());
        assert!(draws[0].buffer.is_some());
        assert_eq!(gl.active_program(), None);
    }

    #[test]
    fn draw_binds_position_when_present() {
        let (_dir, _path, gl, unit) = setup(RED);
        assert_eq!(unit.draw(&gl), Binding::Applied);
        assert_eq!(gl.draws()[0].position, Some(0));
    }

    #[test]
    fn reverting_content_reloads_every_time() {
        let (_dir, path, gl, mut unit) = setup(RED);
        let mut programs = vec![unit.program()];

        for (source, secs) in [(ANIMATED, 2_000), (RED, 3_000), (ANIMATED, 4_000)] {
            write_shader(&path, source, secs);
            assert_eq!(unit.reload_if_modified(&gl).unwrap(), Reload::Reloaded);
            programs.push(unit.program());
        }

        programs.dedup();
        assert_eq!(programs.len(), 4);
    }

    #[test]
    fn touch_without_edit_recompiles() {
        let (_dir, path, gl, mut unit) = setup(RED);
        let before = unit.program();

        touch(&path, 2_000);
        assert_eq!(unit.reload_if_modified(&gl).unwrap(), Reload::Reloaded);
        assert_ne!(unit.program(), before);
        assert_eq!(gl.compile_count(ShaderStage::Fragment), 2);
    }

    #[test]
    fn syntax_error_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.frag");
        write_shader(&path, BROKEN, 1_000);

        let gl = FakeGpu::default();
        match ShaderUnit::new(&gl, &path) {
            Err(ShaderError::Compile { stage, log }) => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(!log.trim().is_empty());
            }
            Err(other) => panic!("expected compile error, got {other:?}"),
            Ok(_) => panic!("broken shader constructed"),
        }
    }

    #[test]
    fn missing_file_fails_construction() {
        let dir = tempfile::tempdir().unwrap();
        let gl = FakeGpu::default();
        let err = ShaderUnit::new(&gl, dir.path().join("nope.frag")).err().unwrap();
        assert!(matches!(err, ShaderError::Load { .. }));
    }

    #[test]
    fn deleted_file_reports_file_access() {
        let (_dir, path, gl, mut unit) = setup(RED);
        let before = unit.program();
        fs::remove_file(&path).unwrap();

        let err = unit.reload_if_modified(&gl).unwrap_err();
        assert!(matches!(err, ShaderError::FileAccess { .. }));
        assert_eq!(unit.program(), before);
    }

    #[test]
    fn empty_diagnostics_are_replaced() {
        assert_eq!(diagnostic("  \n".to_string()), "driver reported no diagnostics");
        assert_eq!(diagnostic("0:1: error".to_string()), "0:1: error");
    }
}
