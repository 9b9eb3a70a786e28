use std::collections::HashMap;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MenuId(usize);

#[derive(Debug, Clone)]
struct MenuNode {
    description: String,
    parent: Option<MenuId>,
    children: Vec<MenuId>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MenuError {
    #[error("menu description '{0}' is already used")]
    DuplicateDescription(String),
}

/// Tree of menu entries stored as an arena; the root is created with the
/// menu and every description is unique, since it doubles as the route key.
#[derive(Debug, Clone)]
pub struct Menu {
    nodes: Vec<MenuNode>,
}

impl Menu {
    pub fn new(root_description: impl Into<String>) -> Self {
        Self {
            nodes: vec![MenuNode {
                description: root_description.into(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> MenuId {
        MenuId(0)
    }

    pub fn add(
        &mut self,
        parent: MenuId,
        description: impl Into<String>,
    ) -> Result<MenuId, MenuError> {
        let description = description.into();
        if self.find(&description).is_some() {
            return Err(MenuError::DuplicateDescription(description));
        }
        let id = MenuId(self.nodes.len());
        self.nodes.push(MenuNode {
            description,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        Ok(id)
    }

    pub fn find(&self, description: &str) -> Option<MenuId> {
        self.nodes
            .iter()
            .position(|node| node.description == description)
            .map(MenuId)
    }

    pub fn description(&self, id: MenuId) -> &str {
        &self.nodes[id.0].description
    }

    pub fn parent(&self, id: MenuId) -> Option<MenuId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: MenuId) -> &[MenuId] {
        &self.nodes[id.0].children
    }

    pub fn has_children(&self, id: MenuId) -> bool {
        !self.nodes[id.0].children.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Enter(MenuId),
    Back,
    Exit,
}

/// Picks the next step while the router sits on `current`. Blocking on user
/// input here is the only place the router waits.
pub trait MenuSelector {
    fn select(&mut self, menu: &Menu, current: MenuId) -> Selection;
}

pub type Handler<T> = Box<dyn FnMut(Option<&T>) -> anyhow::Result<Option<T>>>;

struct Route<T> {
    handler: Handler<T>,
    last_result: Option<T>,
}

/// Walks a [`Menu`] with a [`MenuSelector`], running the handler registered
/// under each entered node's description.
///
/// A handler receives the last result of its parent's handler. Entering a
/// node without children returns to its parent afterwards, whether or not a
/// handler is registered for it.
pub struct UiRouter<T> {
    menu: Menu,
    current: MenuId,
    routes: HashMap<String, Route<T>>,
    reporter: Box<dyn FnMut(&anyhow::Error)>,
}

impl<T> UiRouter<T> {
    pub fn new(menu: Menu) -> Self {
        let current = menu.root();
        Self {
            menu,
            current,
            routes: HashMap::new(),
            reporter: Box::new(|err| tracing::error!(error = %err, "menu handler failed")),
        }
    }

    pub fn with_reporter(mut self, reporter: impl FnMut(&anyhow::Error) + 'static) -> Self {
        self.reporter = Box::new(reporter);
        self
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn current(&self) -> MenuId {
        self.current
    }

    pub fn register(
        &mut self,
        description: impl Into<String>,
        handler: impl FnMut(Option<&T>) -> anyhow::Result<Option<T>> + 'static,
    ) {
        self.routes.insert(
            description.into(),
            Route {
                handler: Box::new(handler),
                last_result: None,
            },
        );
    }

    pub fn last_result(&self, description: &str) -> Option<&T> {
        self.routes
            .get(description)
            .and_then(|route| route.last_result.as_ref())
    }

    pub fn run(&mut self, selector: &mut dyn MenuSelector) {
        loop {
            let next = match selector.select(&self.menu, self.current) {
                Selection::Enter(id) if self.menu.children(self.current).contains(&id) => Some(id),
                Selection::Enter(id) => {
                    tracing::warn!(?id, "ignoring selection outside the current menu");
                    continue;
                }
                Selection::Back => self.menu.parent(self.current),
                Selection::Exit => None,
            };
            let Some(next) = next else {
                break;
            };
            self.current = next;
            self.dispatch(next);
        }
    }

    fn dispatch(&mut self, id: MenuId) {
        let key = self.menu.description(id).to_string();
        if let Some(mut route) = self.routes.remove(&key) {
            let argument = self
                .menu
                .parent(id)
                .and_then(|parent| self.routes.get(self.menu.description(parent)))
                .and_then(|parent_route| parent_route.last_result.as_ref());
            match (route.handler)(argument) {
                Ok(result) => route.last_result = result,
                Err(err) => (self.reporter)(&err),
            }
            self.routes.insert(key, route);
        }

        if !self.menu.has_children(id) {
            if let Some(parent) = self.menu.parent(id) {
                self.current = parent;
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
