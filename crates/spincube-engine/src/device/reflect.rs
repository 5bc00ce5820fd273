//! WGSL compile/link checks and interface reflection.
//!
//! Both context implementations go through here so that compile and link
//! diagnostics, and the name -> location tables, are identical with or without a GPU.

use std::collections::{BTreeMap, BTreeSet};

use naga::valid::{Capabilities, ValidationFlags, Validator};
use naga::{AddressSpace, Binding, Handle, Module, Type, TypeInner};

use super::ShaderStage;

/// Uniform slot declared by a stage.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) struct UniformSlot {
    pub group: u32,
    pub binding: u32,
    /// Size in bytes of the uniform's type.
    pub size: u64,
}

/// Interface of one compiled stage.
#[derive(Debug, Clone)]
pub(crate) struct StageReflection {
    pub stage: ShaderStage,
    pub entry_point: String,
    /// Named inputs with `@location` bindings.
    pub inputs: BTreeMap<String, u32>,
    /// `@location` outputs.
    pub outputs: BTreeSet<u32>,
    pub uniforms: BTreeMap<String, UniformSlot>,
}

/// Interface of a linked program.
#[derive(Debug, Clone)]
pub(crate) struct ProgramReflection {
    pub vertex_entry: String,
    pub fragment_entry: String,
    pub attributes: BTreeMap<String, u32>,
    pub uniforms: BTreeMap<String, UniformSlot>,
}

impl ProgramReflection {
    pub fn uniform_by_slot(&self, group: u32, binding: u32) -> Option<&UniformSlot> {
        self.uniforms
            .values()
            .find(|slot| slot.group == group && slot.binding == binding)
    }
}

/// Parses and validates one stage. `Err` is a human-readable diagnostic.
pub(crate) fn compile_stage(stage: ShaderStage, source: &str) -> Result<StageReflection, String> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| e.emit_to_string(source))?;

    Validator::new(ValidationFlags::all(), Capabilities::default())
        .validate(&module)
        .map_err(|e| error_chain(&e))?;

    let wanted = match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    };

    let mut entry_points = module.entry_points.iter().filter(|ep| ep.stage == wanted);
    let Some(entry) = entry_points.next() else {
        return Err(format!("source has no {stage} entry point"));
    };
    if entry_points.next().is_some() {
        return Err(format!("source has more than one {stage} entry point"));
    }

    let mut inputs = BTreeMap::new();
    for arg in &entry.function.arguments {
        collect_locations(&module, arg.name.as_deref(), arg.ty, arg.binding.as_ref(), &mut inputs);
    }

    let mut outputs = BTreeMap::new();
    if let Some(result) = &entry.function.result {
        collect_locations(&module, None, result.ty, result.binding.as_ref(), &mut outputs);
    }

    let gctx = module.to_ctx();
    let uniforms = module
        .global_variables
        .iter()
        .filter(|(_, var)| var.space == AddressSpace::Uniform)
        .filter_map(|(_, var)| {
            let name = var.name.clone()?;
            let rb = var.binding.as_ref()?;
            let size = module.types[var.ty].inner.size(gctx) as u64;
            Some((
                name,
                UniformSlot {
                    group: rb.group,
                    binding: rb.binding,
                    size,
                },
            ))
        })
        .collect();

    Ok(StageReflection {
        stage,
        entry_point: entry.name.clone(),
        inputs,
        outputs: outputs.into_values().collect(),
        uniforms,
    })
}

/// Checks that two compiled stages form a usable program.
pub(crate) fn link(
    vertex: &StageReflection,
    fragment: &StageReflection,
) -> Result<ProgramReflection, String> {
    if vertex.stage != ShaderStage::Vertex {
        return Err(format!("expected a vertex stage, got {}", vertex.stage));
    }
    if fragment.stage != ShaderStage::Fragment {
        return Err(format!("expected a fragment stage, got {}", fragment.stage));
    }

    for (name, location) in &fragment.inputs {
        if !vertex.outputs.contains(location) {
            return Err(format!(
                "fragment input `{name}` reads location {location}, which the vertex stage never writes"
            ));
        }
    }

    let mut uniforms = vertex.uniforms.clone();
    for (name, slot) in &fragment.uniforms {
        match uniforms.get(name) {
            Some(existing) if existing != slot => {
                return Err(format!("uniform `{name}` is declared differently in each stage"));
            }
            Some(_) => {}
            None => {
                if let Some((other, _)) = uniforms
                    .iter()
                    .find(|(_, s)| s.group == slot.group && s.binding == slot.binding)
                {
                    return Err(format!(
                        "uniforms `{other}` and `{name}` share @group({}) @binding({})",
                        slot.group, slot.binding
                    ));
                }
                uniforms.insert(name.clone(), *slot);
            }
        }
    }

    Ok(ProgramReflection {
        vertex_entry: vertex.entry_point.clone(),
        fragment_entry: fragment.entry_point.clone(),
        attributes: vertex.inputs.clone(),
        uniforms,
    })
}

fn collect_locations(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut BTreeMap<String, u32>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => {
            let key = name
                .map(str::to_owned)
                .unwrap_or_else(|| format!("@location({location})"));
            out.insert(key, *location);
        }
        Some(Binding::BuiltIn(_)) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_locations(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shader::ShaderSource;

    fn reference() -> (StageReflection, StageReflection) {
        let src = ShaderSource::reference();
        let vs = compile_stage(ShaderStage::Vertex, src.vertex()).unwrap();
        let fs = compile_stage(ShaderStage::Fragment, src.fragment()).unwrap();
        (vs, fs)
    }

    #[test]
    fn reference_vertex_stage_exposes_position_and_matrices() {
        let (vs, _) = reference();
        assert_eq!(vs.inputs.get("a_position"), Some(&0));
        let mv = vs.uniforms["u_modelViewMatrix"];
        let proj = vs.uniforms["u_projectionMatrix"];
        assert_eq!((mv.group, mv.binding, mv.size), (0, 0, 64));
        assert_eq!((proj.group, proj.binding, proj.size), (0, 1, 64));
    }

    #[test]
    fn reference_stages_link() {
        let (vs, fs) = reference();
        let program = link(&vs, &fs).unwrap();
        assert_eq!(program.attributes.len(), 1);
        assert_eq!(program.uniforms.len(), 2);
        assert!(program.uniform_by_slot(0, 1).is_some());
    }

    #[test]
    fn syntax_error_is_reported_with_source_context() {
        let err = compile_stage(ShaderStage::Fragment, "@fragment fn main( -> {").unwrap_err();
        assert!(!err.is_empty());
    }

    #[test]
    fn missing_entry_point_is_a_compile_error() {
        let err = compile_stage(ShaderStage::Vertex, ShaderSource::reference().fragment())
            .unwrap_err();
        assert!(err.contains("no vertex entry point"));
    }

    #[test]
    fn unmatched_fragment_input_fails_link() {
        let (vs, _) = reference();
        let fs = compile_stage(
            ShaderStage::Fragment,
            "@fragment fn fs_main(@location(3) tint: vec4<f32>) -> @location(0) vec4<f32> { return tint; }",
        )
        .unwrap();
        let err = link(&vs, &fs).unwrap_err();
        assert!(err.contains("location 3"));
    }

    #[test]
    fn stages_in_wrong_slots_fail_link() {
        let (vs, fs) = reference();
        assert!(link(&fs, &vs).is_err());
    }
}
