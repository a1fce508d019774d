use tracing::{debug, info, warn};

use super::{
    definition::MenuDefinition,
    host::MenuHost,
    layout::{MenuAnchor, MenuGeometry},
    navigation::Navigation,
    pipe::{PipeMenuLoader, PipeMenuOutput},
    registry::MenuRegistry,
    tree::{Menu, MenuId},
};
use crate::config::MenuConfig;

/// Menu state owned by the compositor core
///
/// There is exactly one open stack per session. Every operation takes the
/// compositor as a [`MenuHost`] so the session never has to hold on to it.
#[derive(Debug)]
pub struct MenuSession {
    pub(super) registry: MenuRegistry,
    pub(super) navigation: Navigation,
    pub(super) loader: PipeMenuLoader,
    pub(super) config: MenuConfig,
}

impl MenuSession {
    pub fn new(config: MenuConfig) -> Self {
        Self::with_registry(config, MenuRegistry::new())
    }

    pub fn from_definitions(config: MenuConfig, definitions: &[MenuDefinition]) -> Self {
        Self::with_registry(config, MenuRegistry::from_definitions(definitions))
    }

    fn with_registry(config: MenuConfig, registry: MenuRegistry) -> Self {
        Self {
            registry,
            navigation: Navigation::default(),
            loader: PipeMenuLoader::new(&config.pipemenu),
            config,
        }
    }

    pub fn registry(&self) -> &MenuRegistry {
        &self.registry
    }

    pub fn config(&self) -> &MenuConfig {
        &self.config
    }

    pub fn lookup_by_id(&self, id: &str) -> Option<&Menu> {
        self.registry.lookup(id)
    }

    /// Add or replace a single menu tree
    ///
    /// If the open stack shows any part of the tree being replaced it is
    /// closed first, so no level is left pointing at a removed menu.
    pub fn create_or_replace(
        &mut self,
        definition: &MenuDefinition,
        host: &mut impl MenuHost,
    ) -> MenuId {
        if let Some(old) = self.registry.lookup_id(&definition.id) {
            let doomed = self.registry.subtree(old);
            if self.open_menus().iter().any(|menu| doomed.contains(menu)) {
                debug!(menu = %definition.id, "closing menu before replacing it");
                self.close_root(host);
            }
        }

        let (handle, removed) = self.registry.replace(definition);
        for menu in removed {
            self.loader.cancel(menu);
        }
        handle
    }

    pub fn teardown_all(&mut self, host: &mut impl MenuHost) {
        if self.is_open() {
            self.close_root(host);
        }
        self.loader.cancel_all();
        self.registry.teardown_all();
    }

    /// Rebuild every menu from `definitions`
    ///
    /// The new registry is complete before the old one is dropped.
    pub fn reload(&mut self, definitions: &[MenuDefinition], host: &mut impl MenuHost) {
        let registry = MenuRegistry::from_definitions(definitions);
        if self.is_open() {
            self.close_root(host);
        }
        self.loader.cancel_all();
        self.registry = registry;
        info!(menus = self.registry.len(), "menus reloaded");
    }

    // === Pipe menus ===

    pub fn is_generating(&self) -> bool {
        self.loader.pending() > 0
    }

    /// Wait for the next pipe menu completion, `None` when nothing is running
    pub async fn next_pipe_output(&mut self) -> Option<PipeMenuOutput> {
        if !self.is_generating() {
            return None;
        }
        self.loader.recv().await
    }

    /// Apply every completion already delivered, returns how many were applied
    pub fn dispatch_pending(&mut self, host: &mut impl MenuHost) -> usize {
        let mut applied = 0;
        while let Some(output) = self.loader.try_recv() {
            if self.dispatch_pipe_output(output, host) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one completion, stale ones are dropped and return false
    pub fn dispatch_pipe_output(&mut self, output: PipeMenuOutput, host: &mut impl MenuHost) -> bool {
        if !self.loader.accept(&output) {
            debug!(menu = %output.menu, generation = output.generation, "discarding stale pipe menu output");
            return false;
        }
        let Some(name) = self.registry.get(output.menu).map(|menu| menu.id().to_string()) else {
            return false;
        };

        let (specs, success) = match output.result {
            Ok(specs) => {
                debug!(menu = %name, items = specs.len(), "pipe menu generated");
                (specs, true)
            }
            Err(err) => {
                warn!(menu = %name, "pipe menu generation failed: {err}");
                (Vec::new(), false)
            }
        };

        for removed in self.registry.replace_generated_items(output.menu, specs) {
            self.loader.cancel(removed);
        }
        if let Some(ctx) = self
            .registry
            .get_mut(output.menu)
            .and_then(|menu| menu.pipe_ctx_mut())
        {
            ctx.finish(success);
        }

        self.refresh_level(output.menu, host);
        true
    }

    /// Start generating a pipemenu that is about to be shown
    pub(super) fn prepare_for_show(&mut self, handle: MenuId) {
        let policy = self.config.pipemenu.policy;
        let Some(command) = self
            .registry
            .get(handle)
            .and_then(|menu| menu.pipe_ctx())
            .filter(|ctx| ctx.needs_generation(policy))
            .map(|ctx| ctx.command().to_string())
        else {
            return;
        };

        // Old content goes away while the new one loads
        for removed in self.registry.replace_generated_items(handle, Vec::new()) {
            self.cancel_generation(removed);
        }

        let started = self.loader.generate(handle, &command);
        let Some(ctx) = self
            .registry
            .get_mut(handle)
            .and_then(|menu| menu.pipe_ctx_mut())
        else {
            return;
        };
        match started {
            Ok(_) => ctx.start(),
            Err(err) => {
                warn!(menu = %handle, "pipe menu generation failed: {err}");
                ctx.finish(false);
            }
        }
    }

    pub(super) fn cancel_generation(&mut self, handle: MenuId) {
        self.loader.cancel(handle);
        if let Some(ctx) = self
            .registry
            .get_mut(handle)
            .and_then(|menu| menu.pipe_ctx_mut())
        {
            ctx.cancel();
        }
    }

    /// Ask the host where `handle` goes and remember its size
    pub(super) fn place(
        &mut self,
        handle: MenuId,
        anchor: MenuAnchor,
        host: &mut impl MenuHost,
    ) -> Option<MenuGeometry> {
        let menu = self.registry.get(handle)?;
        let geometry = host.layout_menu(menu, anchor);
        if let Some(menu) = self.registry.get_mut(handle) {
            menu.set_layout(geometry.bounds.size, geometry.align_left);
        }
        Some(geometry)
    }
}
