// src/render/mod.rs

//! Resource rendering: turns component and trait definitions plus parameters
//! into concrete [`Resource`]s.
//!
//! - Components render a primary `output` and named auxiliary `outputs`.
//! - Default-stage traits render against the component's declared output and
//!   may merge a `patch` into it.
//! - PostDispatch traits render against the component's live state; the
//!   caller supplies that state through `context.output` / `context.outputs`.

pub mod context;
pub mod resource;
pub mod template;

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use crate::config::{ComponentDefinition, TraitDefinition};
use crate::expr::ExprError;

pub use context::RenderMeta;
pub use resource::{merge_patch, Provenance, Resource, ResourceKey};
pub use template::render_template;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("{path}: {source}")]
    Expr { path: String, source: ExprError },

    #[error("{path}: required value is not available")]
    Absent { path: String },

    #[error("{path}: {msg}")]
    Template { path: String, msg: String },

    #[error("{path}: {msg}")]
    Invalid { path: String, msg: String },
}

impl RenderError {
    /// Prefix the template path with the owning section (`output`, `patch`,
    /// `outputs.<name>`).
    fn within(self, section: &str) -> Self {
        let prefix = |path: String| match path.strip_prefix('$') {
            Some(rest) => format!("{section}{rest}"),
            None => format!("{section}: {path}"),
        };
        match self {
            RenderError::Expr { path, source } => RenderError::Expr {
                path: prefix(path),
                source,
            },
            RenderError::Absent { path } => RenderError::Absent { path: prefix(path) },
            RenderError::Template { path, msg } => RenderError::Template {
                path: prefix(path),
                msg,
            },
            invalid @ RenderError::Invalid { .. } => invalid,
        }
    }
}

/// A component's rendered (declared) resources.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedComponent {
    pub primary: Resource,
    pub outputs: BTreeMap<String, Resource>,
}

impl RenderedComponent {
    /// Declared auxiliary objects by output name.
    pub fn output_objects(&self) -> BTreeMap<String, Value> {
        self.outputs
            .iter()
            .map(|(name, r)| (name.clone(), r.object.clone()))
            .collect()
    }

    /// Primary first, then auxiliaries by name.
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        std::iter::once(&self.primary).chain(self.outputs.values())
    }
}

/// Render the primary output, then every auxiliary output with
/// `context.output` bound to the rendered primary.
pub fn render_component(
    def: &ComponentDefinition,
    meta: &RenderMeta,
    parameter: &Value,
) -> Result<RenderedComponent, RenderError> {
    let scope = meta.scope(parameter, None, &BTreeMap::new());
    let object = render_template(&def.output, &scope).map_err(|e| e.within("output"))?;
    let primary = Resource::from_rendered(object, meta.provenance(None), "output")?;

    let scope = meta.scope(parameter, Some(&primary.object), &BTreeMap::new());
    let mut outputs = BTreeMap::new();
    for (name, template) in &def.outputs {
        let section = format!("outputs.{name}");
        let object = render_template(template, &scope).map_err(|e| e.within(&section))?;
        let resource = Resource::from_rendered(object, meta.provenance(None), &section)?;
        outputs.insert(name.clone(), resource);
    }

    Ok(RenderedComponent { primary, outputs })
}

/// Render a default-stage trait's `patch` against the component's declared
/// state and merge it into the primary output.
///
/// On error the component is left untouched.
pub fn apply_trait_patch(
    component: &mut RenderedComponent,
    def: &TraitDefinition,
    meta: &RenderMeta,
    parameter: &Value,
) -> Result<(), RenderError> {
    let Some(patch) = def.patch.as_ref() else {
        return Ok(());
    };

    let scope = meta.scope(
        parameter,
        Some(&component.primary.object),
        &component.output_objects(),
    );
    let rendered = render_template(patch, &scope).map_err(|e| e.within("patch"))?;

    let mut object = component.primary.object.clone();
    merge_patch(&mut object, &rendered);
    component.primary = Resource::from_rendered(object, meta.provenance(None), "patch")?;
    Ok(())
}

/// Render a trait's named outputs.
///
/// `output` / `outputs` are the component's declared state for default-stage
/// traits and its live state for PostDispatch traits.
pub fn render_trait_outputs(
    def: &TraitDefinition,
    trait_type: &str,
    meta: &RenderMeta,
    parameter: &Value,
    output: Option<&Value>,
    outputs: &BTreeMap<String, Value>,
) -> Result<BTreeMap<String, Resource>, RenderError> {
    let scope = meta.scope(parameter, output, outputs);
    let mut rendered = BTreeMap::new();
    for (name, template) in &def.outputs {
        let section = format!("outputs.{name}");
        let object = render_template(template, &scope).map_err(|e| e.within(&section))?;
        let resource = Resource::from_rendered(object, meta.provenance(Some(trait_type)), &section)?;
        rendered.insert(name.clone(), resource);
    }
    Ok(rendered)
}
