//! Render graph definition and compilation

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;

use crate::render_graph::pass::*;
use crate::render_graph::transition::{begin_draw_pass, end_draw_pass};

/// Errors raised while building or compiling a render graph
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Render pass {0} was added twice")]
    DuplicatePass(RenderPassName),
    #[error("Render pass {pass} depends on {dependency}, which is not in the graph")]
    UnknownDependency {
        pass: RenderPassName,
        dependency: RenderPassName,
    },
    #[error("Render graph has a dependency cycle through {0:?}")]
    CyclicDependency(Vec<RenderPassName>),
}

/// A set of render passes ordered by their declared dependencies
#[derive(Debug, Default)]
pub struct RenderGraph {
    passes: Vec<RenderPass>,
    pass_lookup: HashMap<RenderPassName, PassHandle>,

    /// `(pass, dependency)` pairs collected during compile
    edges: Vec<(PassHandle, PassHandle)>,
    sorted_order: Vec<PassHandle>,
    /// Passes grouped by longest dependency chain leading to them
    levels: Vec<Vec<PassHandle>>,
    compiled: bool,
}

impl RenderGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a render pass. Dependencies are resolved by name at compile time,
    /// so they may be added in any order.
    pub fn create_pass(&mut self, desc: RenderPassDesc) -> Result<PassHandle, GraphError> {
        assert!(!self.compiled, "render graph is already compiled");

        if self.pass_lookup.contains_key(&desc.name) {
            return Err(GraphError::DuplicatePass(desc.name));
        }

        let handle = PassHandle(self.passes.len() as u32);
        self.pass_lookup.insert(desc.name, handle);
        self.passes.push(RenderPass {
            handle,
            name: desc.name,
            dependencies: desc.dependencies,
            draw_passes: desc.draw_passes,
        });
        Ok(handle)
    }

    pub fn find_pass(&self, name: RenderPassName) -> Option<PassHandle> {
        self.pass_lookup.get(&name).copied()
    }

    /// Get pass by handle
    pub fn get_pass(&self, handle: PassHandle) -> Option<&RenderPass> {
        self.passes.get(handle.index())
    }

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn is_compiled(&self) -> bool {
        self.compiled
    }

    /// Resolve dependencies and sort passes topologically.
    ///
    /// Among passes whose dependencies are all satisfied, the one added first
    /// runs first, so the order is deterministic for a given construction.
    pub fn compile(&mut self) -> Result<(), GraphError> {
        let pass_count = self.passes.len();

        let mut edges = Vec::new();
        for pass in &self.passes {
            for &dependency in &pass.dependencies {
                let Some(&dependency_handle) = self.pass_lookup.get(&dependency) else {
                    return Err(GraphError::UnknownDependency {
                        pass: pass.name,
                        dependency,
                    });
                };
                edges.push((pass.handle, dependency_handle));
            }
        }

        // Topological sort using Kahn's algorithm
        let mut in_degree = vec![0usize; pass_count];
        let mut dependents: Vec<Vec<PassHandle>> = vec![Vec::new(); pass_count];
        for &(pass, dependency) in &edges {
            in_degree[pass.index()] += 1;
            dependents[dependency.index()].push(pass);
        }

        let mut ready: BTreeSet<PassHandle> = self
            .passes
            .iter()
            .filter(|pass| in_degree[pass.handle.index()] == 0)
            .map(|pass| pass.handle)
            .collect();

        let mut sorted_order = Vec::with_capacity(pass_count);
        while let Some(handle) = ready.pop_first() {
            sorted_order.push(handle);
            for &dependent in &dependents[handle.index()] {
                let degree = &mut in_degree[dependent.index()];
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if sorted_order.len() != pass_count {
            let remaining = self
                .passes
                .iter()
                .filter(|pass| in_degree[pass.handle.index()] > 0)
                .map(|pass| pass.name)
                .collect();
            return Err(GraphError::CyclicDependency(remaining));
        }

        let mut depth = vec![0usize; pass_count];
        for &handle in &sorted_order {
            for &(pass, dependency) in &edges {
                if pass == handle {
                    depth[handle.index()] = depth[handle.index()].max(depth[dependency.index()] + 1);
                }
            }
        }
        let level_count = depth.iter().max().map_or(0, |max| max + 1);
        let mut levels = vec![Vec::new(); level_count];
        for &handle in &sorted_order {
            levels[depth[handle.index()]].push(handle);
        }

        log::debug!(
            "Compiled render graph: {}",
            sorted_order
                .iter()
                .map(|handle| self.passes[handle.index()].name.as_str())
                .collect::<Vec<_>>()
                .join(" -> ")
        );

        self.edges = edges;
        self.sorted_order = sorted_order;
        self.levels = levels;
        self.compiled = true;
        Ok(())
    }

    pub fn sorted_order(&self) -> &[PassHandle] {
        &self.sorted_order
    }

    pub fn levels(&self) -> &[Vec<PassHandle>] {
        &self.levels
    }

    pub fn edges(&self) -> &[(PassHandle, PassHandle)] {
        &self.edges
    }

    /// Pass names in execution order
    pub fn sorted_names(&self) -> Vec<RenderPassName> {
        self.sorted_order
            .iter()
            .map(|handle| self.passes[handle.index()].name)
            .collect()
    }

    /// Run every draw pass of every render pass in sorted order
    pub fn execute(&self, ctx: &mut PassExecuteContext<'_>) {
        assert!(self.compiled, "render graph must be compiled before execution");

        for &handle in &self.sorted_order {
            let pass = &self.passes[handle.index()];
            log::trace!("Executing render pass {}", pass.name);

            for draw_pass in &pass.draw_passes {
                begin_draw_pass(&mut *ctx.backend, draw_pass);
                (draw_pass.execute)(ctx, draw_pass.framebuffer.as_ref());
                end_draw_pass(&mut *ctx.backend, draw_pass);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendKind, RecordingBackend};
    use crate::draw::DrawData;
    use crate::frame::{FrameCapacities, FrameContext};
    use crate::render_graph::resource::ResourceRegistry;
    use crate::RendererConfig;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use RenderPassName::*;

    fn pass(name: RenderPassName, dependencies: &[RenderPassName]) -> RenderPassDesc {
        dependencies
            .iter()
            .fold(RenderPassDesc::new(name), |desc, &dep| desc.depends_on(dep))
    }

    fn compiled(passes: Vec<RenderPassDesc>) -> Result<RenderGraph, GraphError> {
        let mut graph = RenderGraph::new();
        for desc in passes {
            graph.create_pass(desc)?;
        }
        graph.compile()?;
        Ok(graph)
    }

    fn recording_pass(name: RenderPassName, log: &Arc<Mutex<Vec<RenderPassName>>>) -> RenderPassDesc {
        let log = log.clone();
        RenderPassDesc::new(name).with_draw_pass(DrawPass::new(move |_, _| log.lock().push(name)))
    }

    fn run(graph: &RenderGraph) {
        let mut backend = RecordingBackend::new(BackendKind::OpenGl);
        let frame = FrameContext::new(&mut backend, FrameCapacities::default()).unwrap();
        let draw_data = DrawData::default();
        let resources = ResourceRegistry::new();
        let config = RendererConfig::default();
        let mut ctx = PassExecuteContext {
            backend: &mut backend,
            frame: &frame,
            draw_data: &draw_data,
            resources: &resources,
            config: &config,
        };
        graph.execute(&mut ctx);
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        let graph = compiled(vec![
            pass(Tone, &[Lighting]),
            pass(Lighting, &[Gbuffer]),
            pass(Gbuffer, &[]),
        ])
        .unwrap();

        assert_eq!(graph.sorted_names(), vec![Gbuffer, Lighting, Tone]);
    }

    #[test]
    fn test_diamond() {
        let graph = compiled(vec![
            pass(Gbuffer, &[]),
            pass(Shadow, &[Gbuffer]),
            pass(HighlightSelect, &[Gbuffer]),
            pass(Lighting, &[Shadow, HighlightSelect]),
        ])
        .unwrap();

        assert_eq!(
            graph.sorted_names(),
            vec![Gbuffer, Shadow, HighlightSelect, Lighting]
        );
        assert_eq!(graph.levels().len(), 3);
        assert_eq!(graph.levels()[1].len(), 2);
        assert_eq!(graph.edges().len(), 4);
    }

    #[test]
    fn test_ties_follow_insertion_order() {
        let graph = compiled(vec![
            pass(Env, &[]),
            pass(Gbuffer, &[]),
            pass(Shadow, &[Env]),
            pass(HighlightSelect, &[Gbuffer]),
        ])
        .unwrap();

        assert_eq!(
            graph.sorted_names(),
            vec![Env, Gbuffer, Shadow, HighlightSelect]
        );
    }

    #[test]
    fn test_sort_is_deterministic() {
        let build = || {
            compiled(vec![
                pass(Bloom, &[Lighting]),
                pass(Emitter, &[Lighting]),
                pass(Lighting, &[]),
                pass(Tone, &[Bloom]),
            ])
            .unwrap()
            .sorted_names()
        };
        assert_eq!(build(), build());
        assert_eq!(build(), vec![Lighting, Bloom, Emitter, Tone]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let result = compiled(vec![
            pass(Gbuffer, &[]),
            pass(Lighting, &[Tone]),
            pass(Tone, &[Lighting]),
        ]);

        assert_eq!(
            result.err(),
            Some(GraphError::CyclicDependency(vec![Lighting, Tone]))
        );
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let result = compiled(vec![pass(Gbuffer, &[Gbuffer])]);
        assert!(matches!(result, Err(GraphError::CyclicDependency(_))));
    }

    #[test]
    fn test_unknown_dependency() {
        let result = compiled(vec![pass(Lighting, &[Shadow])]);
        assert_eq!(
            result.err(),
            Some(GraphError::UnknownDependency {
                pass: Lighting,
                dependency: Shadow
            })
        );
    }

    #[test]
    fn test_duplicate_pass() {
        let mut graph = RenderGraph::new();
        graph.create_pass(pass(Gbuffer, &[])).unwrap();
        assert_eq!(
            graph.create_pass(pass(Gbuffer, &[])),
            Err(GraphError::DuplicatePass(Gbuffer))
        );
    }

    #[test]
    fn test_find_pass() {
        let mut graph = RenderGraph::new();
        let gbuffer = graph.create_pass(pass(Gbuffer, &[])).unwrap();
        let lighting = graph.create_pass(pass(Lighting, &[Gbuffer])).unwrap();

        assert_eq!(graph.find_pass(Gbuffer), Some(gbuffer));
        assert_eq!(graph.find_pass(Lighting), Some(lighting));
        assert_eq!(graph.find_pass(Tone), None);
        assert_eq!(graph.get_pass(lighting).map(|p| p.name), Some(Lighting));
    }

    #[test]
    fn test_empty_graph_compiles() {
        let graph = compiled(Vec::new()).unwrap();
        assert!(graph.sorted_order().is_empty());
        assert!(graph.levels().is_empty());
        run(&graph);
    }

    #[test]
    fn test_execute_runs_passes_in_sorted_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = RenderGraph::new();
        graph
            .create_pass(recording_pass(Tone, &log).depends_on(Lighting))
            .unwrap();
        graph
            .create_pass(recording_pass(Lighting, &log).depends_on(Gbuffer))
            .unwrap();
        graph.create_pass(recording_pass(Gbuffer, &log)).unwrap();
        graph.compile().unwrap();

        run(&graph);

        assert_eq!(*log.lock(), vec![Gbuffer, Lighting, Tone]);
    }

    #[test]
    fn test_execute_runs_fan_in_once_each() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut graph = RenderGraph::new();
        graph.create_pass(recording_pass(Gbuffer, &log)).unwrap();
        graph
            .create_pass(recording_pass(Shadow, &log).depends_on(Gbuffer))
            .unwrap();
        graph
            .create_pass(
                recording_pass(Lighting, &log)
                    .depends_on(Gbuffer)
                    .depends_on(Shadow),
            )
            .unwrap();
        graph.compile().unwrap();

        run(&graph);

        assert_eq!(*log.lock(), vec![Gbuffer, Shadow, Lighting]);
    }

    #[test]
    fn test_execute_runs_draw_passes_in_declared_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut desc = RenderPassDesc::new(Bloom);
        for i in 0..3 {
            let log = log.clone();
            desc.add_draw_pass(DrawPass::new(move |_, _| log.lock().push(i)));
        }
        let graph = compiled(vec![desc]).unwrap();

        run(&graph);

        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "must be compiled")]
    fn test_execute_before_compile_panics() {
        let mut graph = RenderGraph::new();
        graph.create_pass(pass(Gbuffer, &[])).unwrap();
        run(&graph);
    }
}
