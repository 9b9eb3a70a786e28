use super::*;
use std::{cell::RefCell, collections::VecDeque, rc::Rc};

struct Scripted {
    steps: VecDeque<Selection>,
    visited: Vec<MenuId>,
}

impl Scripted {
    fn new(steps: impl IntoIterator<Item = Selection>) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            visited: Vec::new(),
        }
    }
}

impl MenuSelector for Scripted {
    fn select(&mut self, _: &Menu, current: MenuId) -> Selection {
        self.visited.push(current);
        self.steps.pop_front().unwrap_or(Selection::Exit)
    }
}

struct Tree {
    menu: Menu,
    roles: MenuId,
    list: MenuId,
    select: MenuId,
    update: MenuId,
}

fn tree() -> Tree {
    let mut menu = Menu::new("Main Menu");
    let roles = menu.add(menu.root(), "Roles").expect("roles");
    let list = menu.add(roles, "List roles").expect("list");
    let select = menu.add(roles, "Select role").expect("select");
    let update = menu.add(select, "Update role").expect("update");
    Tree {
        menu,
        roles,
        list,
        select,
        update,
    }
}

#[test]
fn descriptions_must_be_unique() {
    let mut menu = Menu::new("Main Menu");
    menu.add(menu.root(), "Roles").expect("roles");
    let err = menu.add(menu.root(), "Roles").expect_err("duplicate");
    assert_eq!(err, MenuError::DuplicateDescription("Roles".into()));
    assert_eq!(menu.children(menu.root()).len(), 1);
}

#[test]
fn tree_links_parents_and_children() {
    let t = tree();
    assert_eq!(t.menu.parent(t.menu.root()), None);
    assert_eq!(t.menu.parent(t.update), Some(t.select));
    assert_eq!(t.menu.children(t.roles), &[t.list, t.select]);
    assert!(!t.menu.has_children(t.list));
    assert_eq!(t.menu.find("Select role"), Some(t.select));
}

#[test]
fn leaf_handler_runs_then_returns_to_parent() {
    let t = tree();
    let calls = Rc::new(RefCell::new(0));
    let mut router: UiRouter<i64> = UiRouter::new(t.menu.clone());
    let counter = calls.clone();
    router.register("List roles", move |_| {
        *counter.borrow_mut() += 1;
        Ok(None)
    });

    let mut selector = Scripted::new([
        Selection::Enter(t.roles),
        Selection::Enter(t.list),
        Selection::Exit,
    ]);
    router.run(&mut selector);

    assert_eq!(*calls.borrow(), 1);
    assert_eq!(selector.visited, vec![t.menu.root(), t.roles, t.roles]);
}

#[test]
fn child_receives_parent_result() {
    let t = tree();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut router: UiRouter<i64> = UiRouter::new(t.menu.clone());
    router.register("Select role", |_| Ok(Some(7)));
    let sink = seen.clone();
    router.register("Update role", move |selected| {
        sink.borrow_mut().push(selected.copied());
        Ok(None)
    });

    let mut selector = Scripted::new([
        Selection::Enter(t.roles),
        Selection::Enter(t.select),
        Selection::Enter(t.update),
        Selection::Exit,
    ]);
    router.run(&mut selector);

    assert_eq!(*seen.borrow(), vec![Some(7)]);
    assert_eq!(router.last_result("Select role"), Some(&7));
    assert_eq!(router.current(), t.select);
}

#[test]
fn handler_error_is_reported_and_loop_continues() {
    let t = tree();
    let reported = Rc::new(RefCell::new(Vec::new()));
    let sink = reported.clone();
    let mut router: UiRouter<i64> =
        UiRouter::new(t.menu.clone()).with_reporter(move |err| sink.borrow_mut().push(err.to_string()));
    router.register("Select role", |_| Ok(Some(3)));
    router.register("List roles", |_| Err(anyhow::anyhow!("database unavailable")));

    let mut selector = Scripted::new([
        Selection::Enter(t.roles),
        Selection::Enter(t.select),
        Selection::Back,
        Selection::Enter(t.list),
        Selection::Enter(t.list),
        Selection::Exit,
    ]);
    router.run(&mut selector);

    assert_eq!(reported.borrow().len(), 2);
    assert_eq!(reported.borrow()[0], "database unavailable");
    assert_eq!(router.last_result("Select role"), Some(&3));
    assert_eq!(router.last_result("List roles"), None);
}

#[test]
fn back_from_root_ends_the_loop() {
    let t = tree();
    let mut router: UiRouter<i64> = UiRouter::new(t.menu.clone());
    let mut selector = Scripted::new([Selection::Back, Selection::Enter(t.roles)]);
    router.run(&mut selector);
    assert_eq!(selector.visited.len(), 1);
    assert_eq!(router.current(), t.menu.root());
}

#[test]
fn selection_outside_current_menu_is_ignored() {
    let t = tree();
    let calls = Rc::new(RefCell::new(0));
    let counter = calls.clone();
    let mut router: UiRouter<i64> = UiRouter::new(t.menu.clone());
    router.register("Update role", move |_| {
        *counter.borrow_mut() += 1;
        Ok(None)
    });

    let mut selector = Scripted::new([Selection::Enter(t.update), Selection::Exit]);
    router.run(&mut selector);
    assert_eq!(*calls.borrow(), 0);
    assert_eq!(router.current(), t.menu.root());
}

#[test]
fn nodes_without_handlers_still_navigate() {
    let t = tree();
    let mut router: UiRouter<i64> = UiRouter::new(t.menu.clone());
    let mut selector = Scripted::new([
        Selection::Enter(t.roles),
        Selection::Enter(t.select),
        Selection::Back,
        Selection::Back,
        Selection::Exit,
    ]);
    router.run(&mut selector);
    assert_eq!(
        selector.visited,
        vec![t.menu.root(), t.roles, t.select, t.roles, t.menu.root()]
    );
}

#[test]
fn leaf_without_handler_returns_to_parent() {
    let t = tree();
    let mut router: UiRouter<i64> = UiRouter::new(t.menu.clone());
    let mut selector = Scripted::new([
        Selection::Enter(t.roles),
        Selection::Enter(t.list),
        Selection::Exit,
    ]);
    router.run(&mut selector);
    assert_eq!(selector.visited, vec![t.menu.root(), t.roles, t.roles]);
    assert_eq!(router.current(), t.roles);
}
