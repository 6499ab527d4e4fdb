use std::sync::OnceLock;

use regex::Regex;

/// Values fed to the fragment shader on every render tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInputs {
    pub global_time: f32,
    pub resolution: [f32; 2],
}

#[derive(Debug, Clone, PartialEq)]
pub enum UniformType {
    Float,
    Vec2,
    Vec3,
    Vec4,
    Sampler2D,
    Other(String),
}

impl UniformType {
    pub fn from_glsl(name: &str) -> Self {
        match name {
            "float" => UniformType::Float,
            "vec2" => UniformType::Vec2,
            "vec3" => UniformType::Vec3,
            "vec4" => UniformType::Vec4,
            "sampler2D" => UniformType::Sampler2D,
            other => UniformType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniformDecl {
    pub name: String,
    pub uniform_type: UniformType,
}

fn uniform_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^\s*uniform\s+(?:(?:lowp|mediump|highp)\s+)?([A-Za-z_][A-Za-z0-9_]*)\s+([A-Za-z_][A-Za-z0-9_]*)\s*(?:\[[^\]]*\])?\s*;")
            .expect("uniform pattern is valid")
    })
}

/// Parse GLSL source for top-level uniform declarations, in source order.
pub fn parse_uniforms(shader_source: &str) -> Vec<UniformDecl> {
    uniform_pattern()
        .captures_iter(shader_source)
        .map(|cap| UniformDecl {
            name: cap[2].to_string(),
            uniform_type: UniformType::from_glsl(&cap[1]),
        })
        .collect()
}

/// Log which declared uniforms the previewer feeds and which stay at zero.
pub fn report_uniforms(shader_source: &str, fed: &[&str]) {
    for decl in parse_uniforms(shader_source) {
        if fed.contains(&decl.name.as_str()) {
            log::debug!("uniform `{}` ({:?}) is fed every frame", decl.name, decl.uniform_type);
        } else {
            log::warn!(
                "uniform `{}` ({:?}) is declared but never set by the previewer",
                decl.name,
                decl.uniform_type
            );
        }
    }
}
