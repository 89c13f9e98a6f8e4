use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use tracing::{debug, info, instrument};

use super::Viewer;
use crate::core::models::ids::{ModelId, SurfaceId};
use crate::core::models::model::Model;
use crate::core::models::style::MaterialStyle;
use crate::core::selection::Selection;
use crate::core::surface::mesh::Mesh;
use crate::core::surface::{SurfaceAtom, SurfaceParams, SurfaceType};
use crate::engine::config::{self, ExtractionMode};
use crate::engine::error::EngineError;
use crate::engine::job::{SurfaceEvent, SurfaceJob, SurfaceStatus, SurfaceTask};

/// Everything `add_surface_with` needs. Unset overrides fall back to the
/// viewer's surface configuration.
#[derive(Debug, Clone)]
pub struct SurfaceRequest {
    pub surface_type: SurfaceType,
    pub material: MaterialStyle,
    /// Atoms whose part of the surface is shown.
    pub display: Selection,
    /// Atoms contributing to the field.
    pub context: Selection,
    /// Atoms the mesh is clipped around.
    pub focus: Option<Selection>,
    pub probe_radius: Option<f64>,
    pub resolution: Option<f64>,
    pub mode: Option<ExtractionMode>,
    pub smooth_normals: Option<bool>,
}

impl SurfaceRequest {
    pub fn new(surface_type: SurfaceType) -> Self {
        Self {
            surface_type,
            material: MaterialStyle::default(),
            display: Selection::all(),
            context: Selection::all(),
            focus: None,
            probe_radius: None,
            resolution: None,
            mode: None,
            smooth_normals: None,
        }
    }

    pub fn material(mut self, material: MaterialStyle) -> Self {
        self.material = material;
        self
    }
    pub fn display(mut self, selection: Selection) -> Self {
        self.display = selection;
        self
    }
    pub fn context(mut self, selection: Selection) -> Self {
        self.context = selection;
        self
    }
    pub fn focus(mut self, selection: Selection) -> Self {
        self.focus = Some(selection);
        self
    }
    pub fn probe_radius(mut self, radius: f64) -> Self {
        self.probe_radius = Some(radius);
        self
    }
    pub fn resolution(mut self, spacing: f64) -> Self {
        self.resolution = Some(spacing);
        self
    }
    pub fn mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = Some(mode);
        self
    }
    pub fn smooth_normals(mut self, smooth: bool) -> Self {
        self.smooth_normals = Some(smooth);
        self
    }
}

/// A ready surface paired with the material it is drawn with.
#[derive(Debug, Clone)]
pub struct RenderableSurface {
    pub id: SurfaceId,
    pub mesh: Arc<Mesh>,
    pub material: MaterialStyle,
}

#[derive(Debug)]
pub(crate) struct SurfaceRecord {
    request: SurfaceRequest,
    params: SurfaceParams,
    mode: ExtractionMode,
    /// Models that contributed atoms when the job was started.
    sources: BTreeSet<ModelId>,
    job: SurfaceJob,
}

impl SurfaceRecord {
    /// Whether edits to `model` can change this surface.
    fn depends_on(&self, model: ModelId) -> bool {
        self.sources.contains(&model)
            || self.request.context.may_touch_model(model)
            || self.request.display.may_touch_model(model)
            || self
                .request
                .focus
                .as_ref()
                .is_some_and(|focus| focus.may_touch_model(model))
    }

    /// Whether atoms of `model` feed this surface's field or clip region. Display
    /// alone only filters context atoms, so it is not consulted.
    fn draws_from(&self, model: &Model) -> bool {
        let id = model.id();
        [Some(&self.request.context), self.request.focus.as_ref()]
            .into_iter()
            .flatten()
            .filter(|selection| selection.may_touch_model(id))
            .any(|selection| model.atoms().any(|(_, atom)| selection.matches(id, atom)))
    }
}

impl Viewer {
    /// Adds a surface over the given selections with the configured parameters.
    pub fn add_surface(
        &mut self,
        surface_type: SurfaceType,
        material: MaterialStyle,
        display: Selection,
        context: Selection,
        focus: Option<Selection>,
    ) -> Result<SurfaceId, EngineError> {
        let mut request = SurfaceRequest::new(surface_type)
            .material(material)
            .display(display)
            .context(context);
        request.focus = focus;
        self.add_surface_with(request)
    }

    /// Adds a surface. In sync mode the mesh is ready on return; in async mode the
    /// surface is pending until its background job publishes.
    #[instrument(skip_all, name = "add_surface", fields(surface_type = %request.surface_type))]
    pub fn add_surface_with(&mut self, request: SurfaceRequest) -> Result<SurfaceId, EngineError> {
        let defaults = self.config.surface;
        let params = SurfaceParams {
            surface_type: request.surface_type,
            probe_radius: request.probe_radius.unwrap_or(defaults.probe_radius),
            resolution: request.resolution.unwrap_or(defaults.resolution),
            smooth_normals: request.smooth_normals.unwrap_or(defaults.smooth_normals),
        };
        config::validate_probe_radius(params.probe_radius)?;
        config::validate_resolution(params.resolution)?;
        let mode = request.mode.unwrap_or(defaults.mode);

        let id = SurfaceId(self.next_surface);
        let (task, sources) = self.surface_task(id, &request, params);
        let job = SurfaceJob::spawn(task, mode, Arc::clone(&self.reporter))?;
        self.next_surface += 1;
        info!(surface = %id, %mode, sources = sources.len(), "Surface added");
        self.surfaces.insert(
            id,
            SurfaceRecord {
                request,
                params,
                mode,
                sources,
                job,
            },
        );
        Ok(id)
    }

    /// Snapshots the atoms a surface needs so the job owns its inputs.
    fn surface_task(
        &self,
        id: SurfaceId,
        request: &SurfaceRequest,
        params: SurfaceParams,
    ) -> (SurfaceTask, BTreeSet<ModelId>) {
        let mut context = Vec::new();
        let mut shown = Vec::new();
        let mut focus = request.focus.as_ref().map(|_| Vec::new());
        let mut sources = BTreeSet::new();

        for model in &self.models {
            let model_id = model.id();
            for (_, atom) in model.atoms() {
                let sphere = SurfaceAtom::new(atom.position, atom.vdw_radius());
                if request.context.matches(model_id, atom) {
                    context.push(sphere);
                    shown.push(request.display.matches(model_id, atom));
                    sources.insert(model_id);
                }
                if let (Some(selection), Some(atoms)) = (&request.focus, focus.as_mut()) {
                    if selection.matches(model_id, atom) {
                        atoms.push(sphere);
                        sources.insert(model_id);
                    }
                }
            }
        }
        debug!(
            surface = %id,
            context = context.len(),
            shown = shown.iter().filter(|s| **s).count(),
            "Surface inputs collected"
        );
        let task = SurfaceTask {
            id,
            context,
            shown,
            focus,
            params,
        };
        (task, sources)
    }

    fn surface_record(&self, id: SurfaceId) -> Result<&SurfaceRecord, EngineError> {
        self.surfaces.get(&id).ok_or(EngineError::SurfaceNotFound(id))
    }

    /// Replaces a surface's material. Never re-triangulates; on a pending surface
    /// the material is stored and used once the mesh is ready.
    pub fn set_surface_material_style(
        &mut self,
        id: SurfaceId,
        material: MaterialStyle,
    ) -> Result<(), EngineError> {
        let record = self
            .surfaces
            .get_mut(&id)
            .ok_or(EngineError::SurfaceNotFound(id))?;
        debug!(surface = %id, status = ?record.job.status(), "Surface material updated");
        record.request.material = material;
        Ok(())
    }

    /// Removes a surface, cancelling it if it is still being computed.
    pub fn remove_surface(&mut self, id: SurfaceId) -> Result<(), EngineError> {
        let record = self
            .surfaces
            .remove(&id)
            .ok_or(EngineError::SurfaceNotFound(id))?;
        record.job.invalidate();
        debug!(surface = %id, "Surface removed");
        Ok(())
    }

    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        self.surfaces.keys().copied().collect()
    }

    pub fn surface_status(&self, id: SurfaceId) -> Result<SurfaceStatus, EngineError> {
        Ok(self.surface_record(id)?.job.status())
    }

    pub fn surface_type(&self, id: SurfaceId) -> Result<SurfaceType, EngineError> {
        Ok(self.surface_record(id)?.params.surface_type)
    }

    /// The stored material, whether or not the surface is ready yet.
    pub fn surface_material(&self, id: SurfaceId) -> Result<&MaterialStyle, EngineError> {
        Ok(&self.surface_record(id)?.request.material)
    }

    /// The mesh, once the surface is ready.
    pub fn surface_mesh(&self, id: SurfaceId) -> Result<Option<Arc<Mesh>>, EngineError> {
        Ok(self.surface_record(id)?.job.mesh())
    }

    /// Mesh and material for drawing, once the surface is ready.
    pub fn renderable_surface(&self, id: SurfaceId) -> Result<Option<RenderableSurface>, EngineError> {
        let record = self.surface_record(id)?;
        Ok(record.job.mesh().map(|mesh| RenderableSurface {
            id,
            mesh,
            material: record.request.material.clone(),
        }))
    }

    /// A handle to the surface's current job, usable after the viewer moves on.
    pub fn surface_job(&self, id: SurfaceId) -> Result<SurfaceJob, EngineError> {
        Ok(self.surface_record(id)?.job.clone())
    }

    /// Blocks until the surface leaves `Pending`.
    pub fn wait_for_surface(&self, id: SurfaceId) -> Result<SurfaceStatus, EngineError> {
        Ok(self.surface_record(id)?.job.wait())
    }

    pub fn wait_for_surface_timeout(
        &self,
        id: SurfaceId,
        timeout: Duration,
    ) -> Result<SurfaceStatus, EngineError> {
        Ok(self.surface_record(id)?.job.wait_timeout(timeout))
    }

    /// Status changes of the surface's current job.
    pub fn subscribe_surface(&self, id: SurfaceId) -> Result<Receiver<SurfaceEvent>, EngineError> {
        Ok(self.surface_record(id)?.job.subscribe())
    }

    /// Recomputes a surface from the current atoms under a new id, which is returned.
    ///
    /// The old id is removed and its job invalidated, so statuses seen under any one
    /// id only ever move forward. Request, parameters and material carry over.
    pub fn refresh_surface(&mut self, id: SurfaceId) -> Result<SurfaceId, EngineError> {
        let record = self.surface_record(id)?;
        let fresh = SurfaceId(self.next_surface);
        let (task, sources) = self.surface_task(fresh, &record.request, record.params);
        let (request, params, mode) = (record.request.clone(), record.params, record.mode);
        let job = SurfaceJob::spawn(task, mode, Arc::clone(&self.reporter))?;
        self.next_surface += 1;

        if let Some(old) = self.surfaces.remove(&id) {
            old.job.invalidate();
        }
        self.surfaces.insert(
            fresh,
            SurfaceRecord {
                request,
                params,
                mode,
                sources,
                job,
            },
        );
        debug!(surface = %id, replacement = %fresh, %mode, "Surface refreshed");
        Ok(fresh)
    }

    /// Invalidates surfaces that an edit to `model` may have changed.
    pub(super) fn invalidate_surfaces_of(&mut self, model: ModelId) -> usize {
        let mut invalidated = 0;
        for (id, record) in &self.surfaces {
            if record.depends_on(model) && record.job.invalidate() {
                debug!(surface = %id, %model, "Surface invalidated by model edit");
                invalidated += 1;
            }
        }
        invalidated
    }

    /// Invalidates surfaces whose context or focus picks up atoms of the newly added `model`.
    pub(super) fn invalidate_surfaces_joined_by(&mut self, model: ModelId) -> usize {
        let Some(added) = self.models.iter().find(|m| m.id() == model) else {
            return 0;
        };
        let mut invalidated = 0;
        for (id, record) in &self.surfaces {
            if record.draws_from(added) && record.job.invalidate() {
                debug!(surface = %id, %model, "Surface invalidated by new model");
                invalidated += 1;
            }
        }
        invalidated
    }

    /// Drops every surface computed from atoms of a removed model.
    pub(super) fn retire_surfaces_of(&mut self, model: ModelId) -> usize {
        let retired: Vec<SurfaceId> = self
            .surfaces
            .iter()
            .filter(|(_, record)| record.sources.contains(&model))
            .map(|(id, _)| *id)
            .collect();
        for id in &retired {
            if let Some(record) = self.surfaces.remove(id) {
                record.job.invalidate();
            }
        }
        retired.len()
    }
}
