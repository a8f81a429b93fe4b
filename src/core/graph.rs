//! Dependency graph queries over `(name, inputs)` pairs.
//!
//! Inputs may name manifolds that are not installed yet; such edges simply
//! lead nowhere.

use std::collections::{HashMap, HashSet, VecDeque};

/// Returns the cycle `name -> ... -> name` that installing `name` with
/// `inputs` would close, if any.
///
/// `inputs_of` answers for manifolds already installed; `name`'s own current
/// entry (when replacing) is never consulted.
pub(crate) fn find_cycle<'a, F>(name: &str, inputs: &[String], inputs_of: F) -> Option<Vec<String>>
where
    F: Fn(&str) -> Option<&'a [String]>,
{
    let mut path = vec![name.to_string()];
    let mut visited = HashSet::new();
    for input in inputs {
        if visit(name, input, &inputs_of, &mut path, &mut visited) {
            return Some(path);
        }
    }
    None
}

fn visit<'a, F>(
    target: &str,
    current: &str,
    inputs_of: &F,
    path: &mut Vec<String>,
    visited: &mut HashSet<String>,
) -> bool
where
    F: Fn(&str) -> Option<&'a [String]>,
{
    path.push(current.to_string());
    if current == target {
        return true;
    }
    if visited.insert(current.to_string()) {
        for next in inputs_of(current).unwrap_or(&[]) {
            if visit(target, next, inputs_of, path, visited) {
                return true;
            }
        }
    }
    path.pop();
    false
}

/// Every manifold that depends on `name`, directly or transitively, in
/// breadth-first order.
pub(crate) fn transitive_dependents<'a, I>(name: &str, nodes: I) -> Vec<String>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
    for (node, inputs) in nodes {
        for input in inputs {
            reverse.entry(input.as_str()).or_default().push(node);
        }
    }

    let mut out = Vec::new();
    let mut seen: HashSet<&str> = HashSet::from([name]);
    let mut queue = VecDeque::from([name]);
    while let Some(current) = queue.pop_front() {
        for &dependent in reverse.get(current).map(Vec::as_slice).unwrap_or(&[]) {
            if seen.insert(dependent) {
                out.push(dependent.to_string());
                queue.push_back(dependent);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        edges
            .iter()
            .map(|(n, ins)| (n.to_string(), ins.iter().map(|s| s.to_string()).collect()))
            .collect()
    }

    fn lookup<'a>(
        g: &'a [(String, Vec<String>)],
    ) -> impl Fn(&str) -> Option<&'a [String]> + 'a {
        move |name| {
            g.iter()
                .find(|(n, _)| n == name)
                .map(|(_, ins)| ins.as_slice())
        }
    }

    #[test]
    fn detects_indirect_cycle() {
        let g = graph(&[("b", &["c"]), ("c", &["a"])]);
        let path = find_cycle("a", &["b".to_string()], lookup(&g));
        assert_eq!(
            path,
            Some(vec!["a".into(), "b".into(), "c".into(), "a".into()])
        );
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let path = find_cycle("a", &["a".to_string()], |_| None);
        assert_eq!(path, Some(vec!["a".into(), "a".into()]));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let g = graph(&[("b", &["d"]), ("c", &["d"]), ("d", &[])]);
        assert_eq!(
            find_cycle("a", &["b".to_string(), "c".to_string()], lookup(&g)),
            None
        );
    }

    #[test]
    fn dependents_are_transitive_and_unique() {
        let g = graph(&[("b", &["a"]), ("c", &["b", "a"]), ("d", &["x"])]);
        let deps = transitive_dependents("a", g.iter().map(|(n, i)| (n.as_str(), i.as_slice())));
        assert_eq!(deps, vec!["b".to_string(), "c".to_string()]);
    }
}
