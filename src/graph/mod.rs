pub mod nav_graph;
