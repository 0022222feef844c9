//! Single-hop traversal in both directions.

mod common;

use propgraph::{
    Direction, Edge, EdgeNode, ErrorKind, Filter, FilterSet, Graph, GraphConfig, Node, Operator,
    SchemaManager,
};
use rusqlite::Transaction;

use common::{new_id, setup, user, Follows, Tweet, User, Wrote};

/// Creates users A and B with a single edge `follows` (in = A, out = B).
fn a_follows_b(graph: &Graph, tx: &Transaction<'_>) -> (Node<User>, Node<User>) {
    let a = Node::new(new_id(), "user", user("a"));
    let b = Node::new(new_id(), "user", user("b"));
    graph.nodes_create(tx, &[a.clone(), b.clone()]).unwrap();
    graph
        .edge_create(tx, &Edge::new(new_id(), "follows", a.id(), b.id(), Follows {}))
        .unwrap();
    (a, b)
}

#[test]
fn direction_semantics() {
    let (mut conn, graph) = setup();
    let tx = conn.transaction().unwrap();
    let (a, b) = a_follows_b(&graph, &tx);

    let out_of_a = graph.nodes_out_related_by(&tx, a.id(), "follows", None).unwrap();
    assert_eq!(out_of_a.len(), 1);
    assert_eq!(out_of_a[0].node.id(), b.id());
    assert_eq!(out_of_a[0].edge.in_id, a.entity.id);

    let into_b = graph.nodes_in_related_by(&tx, b.id(), "follows", None).unwrap();
    assert_eq!(into_b.len(), 1);
    assert_eq!(into_b[0].node.id(), a.id());

    let out_of_b = graph.nodes_out_related_by(&tx, b.id(), "follows", None).unwrap();
    assert!(out_of_b.is_empty());

    let into_a = graph
        .nodes_related_by(&tx, a.id(), Direction::In, "follows", None)
        .unwrap();
    assert!(into_a.is_empty());
}

#[test]
fn edge_type_scopes_the_hop() {
    let (mut conn, graph) = setup();
    let tx = conn.transaction().unwrap();
    let (a, _) = a_follows_b(&graph, &tx);

    let hops = graph.nodes_out_related_by(&tx, a.id(), "blocks", None).unwrap();
    assert!(hops.is_empty());
}

#[test]
fn generic_records_decode_to_the_callers_types() {
    let (mut conn, graph) = setup();
    let tx = conn.transaction().unwrap();
    let (a, b) = a_follows_b(&graph, &tx);

    let hop = graph
        .nodes_out_related_by(&tx, a.id(), "follows", None)
        .unwrap()
        .remove(0);
    let typed: EdgeNode<Follows, User> = hop.decode().unwrap();
    assert_eq!(typed.node.properties.username, "b");

    let direct: Vec<EdgeNode<Follows, User>> = graph
        .related_by(&tx, b.id(), Direction::In, "follows", None)
        .unwrap();
    assert_eq!(direct[0].node.properties, a.properties);
}

#[test]
fn typed_hop_with_the_wrong_type_fails_to_decode() {
    let (mut conn, graph) = setup();
    let tx = conn.transaction().unwrap();
    let (a, _) = a_follows_b(&graph, &tx);

    let err = graph
        .related_by::<Follows, Tweet>(&tx, a.id(), Direction::Out, "follows", None)
        .unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::Deserialization(_)));
    assert!(err.rollback().is_completed());
}

#[test]
fn filters_apply_to_the_joined_row() {
    let (mut conn, graph) = setup();
    let tx = conn.transaction().unwrap();
    let author = Node::new(new_id(), "user", user("mark"));
    graph.node_create(&tx, &author).unwrap();

    let tweets: Vec<_> = ["pinned: hello", "second", "third"]
        .into_iter()
        .map(|body| Node::new(new_id(), "tweet", Tweet { body: body.into() }))
        .collect();
    graph.nodes_create(&tx, &tweets).unwrap();
    let wrote: Vec<_> = tweets
        .iter()
        .map(|t| Edge::new(new_id(), "wrote", author.id(), t.id(), Wrote {}))
        .collect();
    graph.edges_create(&tx, &wrote).unwrap();

    let all = graph.nodes_out_related_by(&tx, author.id(), "wrote", None).unwrap();
    assert_eq!(all.len(), 3);

    let empty_filters = FilterSet::new();
    let all_again = graph
        .nodes_out_related_by(&tx, author.id(), "wrote", Some(&empty_filters))
        .unwrap();
    assert_eq!(all_again.len(), 3);

    let pinned_only = FilterSet::new()
        .with(Filter::new("n.type", "tweet".to_string()))
        .with(Filter::compare(
            "json_extract(n.properties, '$.body')",
            Operator::Like,
            "pinned%".to_string(),
        ));
    let pinned: Vec<EdgeNode<Wrote, Tweet>> = graph
        .related_by(&tx, author.id(), Direction::Out, "wrote", Some(&pinned_only))
        .unwrap();
    assert_eq!(pinned.len(), 1);
    assert_eq!(pinned[0].node.id(), tweets[0].id());
}

#[test]
fn caller_composes_multiple_hops() {
    let (mut conn, graph) = setup();
    let tx = conn.transaction().unwrap();

    let users: Vec<_> = ["you", "mark", "kram"]
        .into_iter()
        .map(|name| Node::new(new_id(), "user", user(name)))
        .collect();
    graph.nodes_create(&tx, &users).unwrap();
    let (you, mark, kram) = (&users[0], &users[1], &users[2]);
    graph
        .edges_create(
            &tx,
            &[
                Edge::new(new_id(), "follows", you.id(), mark.id(), Follows {}),
                Edge::new(new_id(), "follows", you.id(), kram.id(), Follows {}),
            ],
        )
        .unwrap();
    for (author, n) in [(mark, 2), (kram, 1)] {
        for i in 0..n {
            let body = format!("{} #{i}", author.properties.username);
            let tweet = Node::new(new_id(), "tweet", Tweet { body });
            graph.node_create(&tx, &tweet).unwrap();
            graph
                .edge_create(&tx, &Edge::new(new_id(), "wrote", author.id(), tweet.id(), Wrote {}))
                .unwrap();
        }
    }

    let mut timeline = Vec::new();
    for followed in graph.nodes_out_related_by(&tx, you.id(), "follows", None).unwrap() {
        let written: Vec<EdgeNode<Wrote, Tweet>> = graph
            .related_by(&tx, followed.node.id(), Direction::Out, "wrote", None)
            .unwrap();
        timeline.extend(written.into_iter().map(|hop| hop.node.properties.body));
    }
    timeline.sort();

    assert_eq!(timeline, vec!["kram #0", "mark #0", "mark #1"]);
}

#[test]
fn graphs_with_custom_tables_are_isolated() {
    let (mut conn, default_graph) = setup();
    let social = Graph::new(GraphConfig::new("social_node", "social_edge").unwrap());
    SchemaManager::new(social.config().clone())
        .build_schema(&mut conn)
        .unwrap();

    let tx = conn.transaction().unwrap();
    let (a, b) = a_follows_b(&social, &tx);

    let hops = social.nodes_out_related_by(&tx, a.id(), "follows", None).unwrap();
    assert_eq!(hops[0].node.id(), b.id());

    let default_nodes = default_graph
        .nodes_get_by::<User>(&tx, &FilterSet::new())
        .unwrap();
    assert!(default_nodes.is_empty());
    let missing = default_graph
        .nodes_out_related_by(&tx, a.id(), "follows", None)
        .unwrap();
    assert!(missing.is_empty());
}
