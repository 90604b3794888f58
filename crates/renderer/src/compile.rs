//! Fragment wrapping and front-end validation.
//!
//! User sources are plain GLSL fragment bodies that write to `O` and read the
//! fixed uniform names (`resolution`, `time`, `move`, `touch`, `pointerCount`,
//! `pointers`). [`wrap_fragment`] injects the prelude that declares those as a
//! std140 uniform block, and [`validate_fragment`] runs the wrapped source
//! through naga's GLSL front-end and validator without touching the GPU;
//! this is the throwaway `test` compile. Line numbers in diagnostics are
//! mapped back into the unwrapped user source.

use std::borrow::Cow;

use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::valid::{Capabilities, ValidationFlags, Validator};
use wgpu::naga::ShaderStage;

use crate::diagnostics::{format_error_line, CompileDiagnostic, StageKind};

/// Compiles the static full-screen quad vertex shader.
pub(crate) fn compile_vertex_module(device: &wgpu::Device) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fullscreen quad vertex"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Borrowed(VERTEX_SHADER_GLSL),
            stage: ShaderStage::Vertex,
            defines: &[],
        },
    })
}

/// Compiles an already-validated wrapped fragment source on the device.
///
/// Callers are expected to hold a validation error scope open: a source that
/// slipped past [`validate_fragment`] still fails here as the link-failure
/// analogue rather than panicking the frame loop.
pub(crate) fn compile_fragment_module(device: &wgpu::Device, wrapped: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("fragpad fragment"),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(wrapped.to_string()),
            stage: ShaderStage::Fragment,
            defines: &[],
        },
    })
}

/// Produces a self-contained GLSL fragment shader from a user source.
///
/// `#version` directives and user re-declarations of the fixed uniforms are
/// blanked (not removed) so reported line numbers keep a constant offset from
/// the unwrapped source.
pub(crate) fn wrap_fragment(source: &str) -> String {
    let mut sanitized = String::with_capacity(source.len());
    let mut seen_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        let is_version = !seen_version && trimmed.starts_with("#version");
        if is_version {
            seen_version = true;
        }
        let is_reserved_uniform = trimmed.starts_with("uniform ")
            && (trimmed.contains("resolution")
                || trimmed.contains("time")
                || trimmed.contains("move")
                || trimmed.contains("touch")
                || trimmed.contains("pointerCount")
                || trimmed.contains("pointers"));
        if !(is_version || is_reserved_uniform) {
            sanitized.push_str(line);
        }
        sanitized.push('\n');
    }
    format!("{HEADER}\n{sanitized}")
}

fn header_line_count() -> u32 {
    // wrap_fragment joins with '\n', so user line 1 sits at HEADER lines + 1.
    HEADER.lines().count() as u32
}

/// Runs `candidate` through the GLSL front-end and validator as a throwaway
/// fragment stage. Returns the diagnostic on failure, `None` on success.
///
/// This is the whole of the `test` contract: it owns no GPU objects, mutates
/// nothing, and everything it allocates is dropped before returning.
pub fn validate_fragment(candidate: &str) -> Option<CompileDiagnostic> {
    let wrapped = wrap_fragment(candidate);
    let mut frontend = Frontend::default();
    let module = match frontend.parse(&Options::from(ShaderStage::Fragment), &wrapped) {
        Ok(module) => module,
        Err(errors) => {
            let offset = header_line_count();
            let lines: Vec<String> = errors
                .errors
                .iter()
                .map(|error| {
                    let location = error.meta.location(&wrapped);
                    format_error_line(
                        location.line_position,
                        location.line_number.saturating_sub(offset),
                        &error.kind.to_string(),
                    )
                })
                .collect();
            return Some(CompileDiagnostic::new(
                StageKind::Fragment,
                lines.join("\n"),
            ));
        }
    };

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    match validator.validate(&module) {
        Ok(_) => None,
        Err(error) => {
            let offset = header_line_count();
            let (column, line) = error
                .spans()
                .next()
                .map(|(span, _)| {
                    let location = span.location(&wrapped);
                    (
                        location.line_position,
                        location.line_number.saturating_sub(offset),
                    )
                })
                .unwrap_or((0, 0));
            Some(CompileDiagnostic::new(
                StageKind::Fragment,
                format_error_line(column, line, &error.as_inner().to_string()),
            ))
        }
    }
}

/// Validates the built-in vertex stage. Exists so setup can report either
/// stage symmetrically; the constant below is expected to always pass.
pub(crate) fn validate_vertex() -> Option<CompileDiagnostic> {
    let mut frontend = Frontend::default();
    let module = match frontend.parse(&Options::from(ShaderStage::Vertex), VERTEX_SHADER_GLSL) {
        Ok(module) => module,
        Err(errors) => {
            return Some(CompileDiagnostic::new(
                StageKind::Vertex,
                errors.emit_to_string(VERTEX_SHADER_GLSL),
            ))
        }
    };
    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(&module)
        .err()
        .map(|error| CompileDiagnostic::new(StageKind::Vertex, error.as_inner().to_string()))
}

/// Maximum simultaneously tracked pointers fed to the uniform array.
pub const MAX_POINTERS: usize = 10;

/// GLSL prologue injected ahead of every user fragment source.
///
/// The uniform block layout must match `PadUniforms` in `gpu/uniforms.rs`;
/// vec2 array elements carry std140's 16-byte stride on the Rust side.
const HEADER: &str = r"#version 450
layout(location = 0) out vec4 O;

layout(std140, set = 0, binding = 0) uniform PadInputs {
    vec2 _resolution;
    float _time;
    int _pointerCount;
    vec2 _move;
    vec2 _touch;
    vec2 _pointers[10];
} ubo;

#define resolution ubo._resolution
#define time ubo._time
#define pointerCount ubo._pointerCount
#define move ubo._move
#define touch ubo._touch
#define pointers ubo._pointers";

/// Fixed 4-vertex triangle-strip quad spanning clip space [-1,1]^2. Never
/// user-controllable.
const VERTEX_SHADER_GLSL: &str = r"#version 450
void main() {
    float x = (gl_VertexIndex == 1 || gl_VertexIndex == 3) ? 1.0 : -1.0;
    float y = (gl_VertexIndex >= 2) ? 1.0 : -1.0;
    gl_Position = vec4(x, y, 0.0, 1.0);
}
";

#[cfg(test)]
mod tests {
    use super::*;

    const RED: &str = "void main(){O=vec4(1,0,0,1);}";

    #[test]
    fn wrap_blanks_version_and_reserved_uniforms() {
        let source = "#version 300 es\nuniform float time;\nvoid main(){O=vec4(time);}\n";
        let wrapped = wrap_fragment(source);
        assert!(!wrapped.contains("#version 300 es"));
        assert!(!wrapped.contains("uniform float time"));
        assert!(wrapped.contains("void main(){O=vec4(time);}"));
        // Blanked lines keep the user line count intact.
        assert_eq!(
            wrapped.lines().count(),
            HEADER.lines().count() + source.lines().count()
        );
    }

    #[test]
    fn valid_source_passes() {
        assert!(validate_fragment(RED).is_none());
    }

    #[test]
    fn uniforms_are_visible_to_user_code() {
        let source = "void main(){\n  vec2 uv = gl_FragCoord.xy / resolution;\n  O = vec4(uv, fract(time), float(pointerCount));\n}";
        assert!(validate_fragment(source).is_none());
    }

    #[test]
    fn syntax_error_reports_driver_format() {
        // Missing semicolon.
        let diag = validate_fragment("void main(){O=vec4(1,0,0,1)}").expect("diagnostic");
        assert!(diag.message().contains("ERROR:"));
    }

    #[test]
    fn error_line_maps_into_user_source() {
        let source = "void main(){\n  O = vec4(1.0)\n}";
        let diag = validate_fragment(source).expect("diagnostic");
        let line = diag.line();
        assert!((2..=3).contains(&line), "line {line} outside user source");
    }

    #[test]
    fn repeated_tests_are_independent() {
        for _ in 0..16 {
            assert!(validate_fragment("void main(){broken").is_some());
            assert!(validate_fragment(RED).is_none());
        }
    }

    #[test]
    fn builtin_vertex_stage_is_clean() {
        assert!(validate_vertex().is_none());
    }
}
