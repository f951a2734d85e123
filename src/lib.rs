//! Incremental spring-force graph layout with Barnes-Hut repulsion.
//!
//! This crate assigns 2-D positions to the nodes of a graph by
//! simulating a physical system one discrete time step at a time: edges
//! act as springs pulling their endpoints toward a rest length, and all
//! unlocked nodes repel each other through an approximate n-body force
//! field. An external driver (typically a render loop) calls
//! [`SpringLayout::step`] once per tick and stops whenever the layout
//! looks settled enough — the algorithm itself never terminates.
//!
//! # Architecture
//!
//! - `graph`: the [`GraphView`] trait the engine observes graphs
//!   through, and [`GraphStore`], a thread-safe petgraph-backed default
//! - `layout`: the [`LayoutModel`] position store shared with renderers,
//!   and the [`SpringLayout`] engine behind the [`IterativeLayout`]
//!   driver contract
//! - `spatial`: the [`BarnesHutTree`] quadtree answering approximate
//!   repulsion queries in O(log n) per node
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use spring_embedder::{GraphStore, LayoutModel, SpringLayout};
//!
//! let graph = Arc::new(GraphStore::new());
//! let a = graph.add_node();
//! let b = graph.add_node();
//! graph.add_edge(a, b, 1.0);
//!
//! let model = Arc::new(LayoutModel::new(640, 480));
//! model.set(a, 100.0, 240.0);
//! model.set(b, 500.0, 240.0);
//!
//! let mut layout = SpringLayout::new();
//! layout.attach(Arc::clone(&model), graph).unwrap();
//! for _ in 0..50 {
//!     layout.step().unwrap();
//! }
//!
//! // The spring has pulled the pair toward its rest length of 30.
//! let pa = model.get(a).unwrap();
//! let pb = model.get(b).unwrap();
//! assert!(pa.distance_squared(pb) < 400.0 * 400.0);
//! ```

pub mod graph;
pub mod layout;
pub mod spatial;

pub use graph::{EdgeEndpoints, GraphStore, GraphView, NodeId};
pub use layout::{
    EdgeLengthFn, IterativeLayout, LayoutError, LayoutModel, Point, SpringConfig, SpringLayout,
};
pub use spatial::{BarnesHutTree, ForceObject, Rect};

#[cfg(test)]
mod integration_tests {
    use std::sync::Arc;

    use super::{GraphStore, GraphView, LayoutModel, NodeId, Point, SpringConfig, SpringLayout};

    fn seeded(seed: u64) -> SpringConfig {
        SpringConfig {
            jitter_seed: Some(seed),
            ..SpringConfig::default()
        }
    }

    /// Build a model, graph and attached layout from position and edge
    /// listings.
    fn build(
        width: u32,
        height: u32,
        positions: &[(f64, f64)],
        edges: &[(usize, usize)],
        config: SpringConfig,
    ) -> (Arc<GraphStore>, Arc<LayoutModel>, SpringLayout, Vec<NodeId>) {
        let graph = Arc::new(GraphStore::new());
        let model = Arc::new(LayoutModel::new(width, height));
        let ids: Vec<NodeId> = positions
            .iter()
            .map(|&(x, y)| {
                let id = graph.add_node();
                model.set(id, x, y);
                id
            })
            .collect();
        for &(a, b) in edges {
            graph.add_edge(ids[a], ids[b], 1.0);
        }

        let mut layout = SpringLayout::with_config(config);
        layout
            .attach(Arc::clone(&model), Arc::clone(&graph) as Arc<dyn GraphView>)
            .unwrap();
        (graph, model, layout, ids)
    }

    fn distance(a: Point, b: Point) -> f64 {
        a.distance_squared(b).sqrt()
    }

    #[test]
    fn test_positions_stay_in_bounds() {
        let positions = [
            (1.0, 1.0),
            (199.0, 1.0),
            (1.0, 149.0),
            (199.0, 149.0),
            (100.0, 75.0),
            (101.0, 75.0),
        ];
        let edges = [(0, 4), (1, 4), (2, 4), (3, 4), (4, 5)];
        let (_graph, model, mut layout, ids) = build(200, 150, &positions, &edges, seeded(3));

        for _ in 0..25 {
            layout.step().unwrap();
            for &id in &ids {
                let p = model.get(id).unwrap();
                assert!(p.x >= 0.0 && p.x <= 200.0, "x out of bounds: {}", p.x);
                assert!(p.y >= 0.0 && p.y <= 150.0, "y out of bounds: {}", p.y);
            }
        }
    }

    #[test]
    fn test_locked_node_never_moves() {
        let (_graph, model, mut layout, ids) = build(
            1000,
            1000,
            &[(300.0, 500.0), (400.0, 500.0)],
            &[(0, 1)],
            seeded(4),
        );
        model.set_locked(ids[0], true);
        let pinned = model.get(ids[0]).unwrap();
        let free_before = model.get(ids[1]).unwrap();

        for _ in 0..10 {
            layout.step().unwrap();
        }

        assert_eq!(model.get(ids[0]).unwrap(), pinned);
        assert_ne!(model.get(ids[1]).unwrap(), free_before);
    }

    #[test]
    fn test_long_edge_contracts() {
        // Repulsion off: pure spring behavior.
        let config = SpringConfig {
            repulsion_range: 0,
            ..seeded(5)
        };
        let (_graph, model, mut layout, ids) = build(
            1000,
            1000,
            &[(450.0, 500.0), (550.0, 500.0)],
            &[(0, 1)],
            config,
        );

        let before_a = model.get(ids[0]).unwrap();
        let before_b = model.get(ids[1]).unwrap();
        layout.step().unwrap();
        let after_a = model.get(ids[0]).unwrap();
        let after_b = model.get(ids[1]).unwrap();

        // 100 apart with rest length 30: both endpoints close in at the
        // speed cap, so the gap shrinks by exactly 10.
        assert!((distance(after_a, after_b) - 90.0).abs() < 1e-9);
        assert!((after_a.x - before_a.x).abs() <= 5.0 + 1e-9);
        assert!((after_b.x - before_b.x).abs() <= 5.0 + 1e-9);
        assert_eq!(after_a.y, before_a.y);
        assert_eq!(after_b.y, before_b.y);
    }

    #[test]
    fn test_short_edge_expands() {
        let config = SpringConfig {
            repulsion_range: 0,
            ..seeded(6)
        };
        let (_graph, model, mut layout, ids) = build(
            1000,
            1000,
            &[(495.0, 500.0), (505.0, 500.0)],
            &[(0, 1)],
            config,
        );

        let before = distance(model.get(ids[0]).unwrap(), model.get(ids[1]).unwrap());
        layout.step().unwrap();
        let after = distance(model.get(ids[0]).unwrap(), model.get(ids[1]).unwrap());

        // 10 apart with rest length 30: the spring pushes outward.
        assert!(after > before);
        assert!(after <= before + 10.0 + 1e-9);
    }

    #[test]
    fn test_coincident_pair_separates() {
        let (_graph, model, mut layout, ids) = build(
            1000,
            1000,
            &[(500.0, 500.0), (500.0, 500.0)],
            &[],
            seeded(7),
        );

        layout.step().unwrap();
        let a = model.get(ids[0]).unwrap();
        let b = model.get(ids[1]).unwrap();
        assert_ne!(a, b, "jitter failed to separate a coincident pair");
    }

    #[test]
    fn test_three_coincident_nodes_all_distinct() {
        let (_graph, model, mut layout, ids) = build(
            1000,
            1000,
            &[(500.0, 500.0), (500.0, 500.0), (500.0, 500.0)],
            &[],
            seeded(8),
        );

        layout.step().unwrap();
        let a = model.get(ids[0]).unwrap();
        let b = model.get(ids[1]).unwrap();
        let c = model.get(ids[2]).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[test]
    fn test_per_step_displacement_capped() {
        let positions = [
            (500.0, 500.0),
            (501.0, 500.0),
            (500.0, 501.0),
            (501.0, 501.0),
            (502.0, 502.0),
        ];
        let edges = [(0, 1), (0, 2), (0, 3), (0, 4), (1, 2), (3, 4)];
        let (_graph, model, mut layout, ids) = build(1000, 1000, &positions, &edges, seeded(9));

        for _ in 0..20 {
            let before: Vec<Point> = ids.iter().map(|&id| model.get(id).unwrap()).collect();
            layout.step().unwrap();
            for (i, &id) in ids.iter().enumerate() {
                let after = model.get(id).unwrap();
                assert!((after.x - before[i].x).abs() <= 5.0 + 1e-9);
                assert!((after.y - before[i].y).abs() <= 5.0 + 1e-9);
            }
        }
    }

    #[test]
    fn test_fixed_seed_reproduces_trajectories() {
        let positions = [
            (500.0, 500.0),
            (500.0, 500.0),
            (520.0, 480.0),
            (700.0, 700.0),
        ];
        let edges = [(0, 2), (2, 3)];

        let run = || {
            let (_graph, model, mut layout, ids) =
                build(1000, 1000, &positions, &edges, seeded(42));
            for _ in 0..5 {
                layout.step().unwrap();
            }
            ids.iter()
                .map(|&id| model.get(id).unwrap())
                .collect::<Vec<Point>>()
        };

        // Bitwise identical across runs, jitter path included.
        assert_eq!(run(), run());
    }

    #[test]
    fn test_relaxation_settles_toward_rest_length() {
        let config = SpringConfig {
            repulsion_range: 0,
            ..seeded(10)
        };
        let (_graph, model, mut layout, ids) = build(
            1000,
            1000,
            &[(400.0, 500.0), (600.0, 500.0)],
            &[(0, 1)],
            config,
        );

        for _ in 0..200 {
            layout.step().unwrap();
        }
        let gap = distance(model.get(ids[0]).unwrap(), model.get(ids[1]).unwrap());
        assert!(
            (gap - 30.0).abs() < 5.0,
            "expected the pair near its rest length of 30, got {gap}"
        );
    }

    #[test]
    fn test_renderer_reads_while_stepping() {
        let positions: Vec<(f64, f64)> = (0..30)
            .map(|i| (100.0 + (i % 6) as f64 * 20.0, 100.0 + (i / 6) as f64 * 20.0))
            .collect();
        let edges: Vec<(usize, usize)> = (1..30).map(|i| (i - 1, i)).collect();
        let (_graph, model, mut layout, _ids) = build(400, 400, &positions, &edges, seeded(11));

        let reader = {
            let model = Arc::clone(&model);
            std::thread::spawn(move || {
                // A renderer polling positions mid-run only ever sees
                // committed, in-bounds layouts.
                for _ in 0..500 {
                    for (_, p) in model.snapshot() {
                        assert!(p.x >= 0.0 && p.x <= 400.0);
                        assert!(p.y >= 0.0 && p.y <= 400.0);
                    }
                }
            })
        };

        for _ in 0..100 {
            layout.step().unwrap();
        }
        reader.join().unwrap();
    }

    #[test]
    fn test_custom_edge_length() {
        let config = SpringConfig {
            repulsion_range: 0,
            ..seeded(12)
        };
        let (_graph, model, mut layout, ids) = build(
            1000,
            1000,
            &[(450.0, 500.0), (550.0, 500.0)],
            &[(0, 1)],
            config,
        );
        // Rest length equal to the current gap: equilibrium, no motion.
        layout.set_edge_length(|_| 100.0);

        let before_a = model.get(ids[0]).unwrap();
        layout.step().unwrap();
        assert_eq!(model.get(ids[0]).unwrap(), before_a);
    }

    #[test]
    fn test_graph_mutation_between_steps() {
        let (graph, model, mut layout, ids) = build(
            1000,
            1000,
            &[(480.0, 500.0), (520.0, 500.0)],
            &[(0, 1)],
            seeded(13),
        );

        layout.step().unwrap();

        // Nodes added after attach join the simulation; their repulsion
        // view is stale (the tree predates them) but springs apply.
        let late = graph.add_node();
        model.set(late, 500.0, 600.0);
        graph.add_edge(ids[0], late, 1.0);

        layout.step().unwrap();
        let p = model.get(late).unwrap();
        assert_ne!(p, Point::new(500.0, 600.0));
    }
}
