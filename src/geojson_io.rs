// ===========================================================================
// GeoJSON node / edge tables
// ===========================================================================
use crate::error::{GraphError, io_err};
use crate::geometry_utils::polyline_length;
use crate::graph_types::{Attributes, Edge, Node, StreetGraph};
use geo_types::{Coord, LineString};
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde_json::json;
use std::path::Path;

const NODE_COLUMNS: &[&str] = &["nodeID", "x", "y", "cluster"];
const EDGE_COLUMNS: &[&str] = &[
    "edgeID",
    "u",
    "v",
    "length",
    "name",
    "pedestrian",
    "new_geo",
];

fn feature_collection(text: &str) -> Result<FeatureCollection, GraphError> {
    let geojson: GeoJson = text.parse()?;
    Ok(FeatureCollection::try_from(geojson)?)
}

fn required_id(
    props: &JsonObject,
    table: &'static str,
    column: &'static str,
    index: usize,
) -> Result<i64, GraphError> {
    props
        .get(column)
        .and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        })
        .ok_or(GraphError::MissingColumn {
            table,
            column,
            index,
        })
}

fn pass_through(props: &JsonObject, managed: &[&str]) -> Attributes {
    props
        .iter()
        .filter(|(k, _)| !managed.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn position(values: &[f64], table: &'static str, id: i64) -> Result<Coord<f64>, GraphError> {
    match values {
        [x, y, ..] => Ok(Coord { x: *x, y: *y }),
        _ => Err(GraphError::InvalidGeometry {
            table,
            id,
            reason: "position needs two ordinates".to_string(),
        }),
    }
}

pub fn nodes_from_geojson(text: &str) -> Result<Vec<Node>, GraphError> {
    let collection = feature_collection(text)?;
    let empty = JsonObject::new();
    let mut nodes = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.iter().enumerate() {
        let props = feature.properties.as_ref().unwrap_or(&empty);
        let id = required_id(props, "nodes", "nodeID", index)?;
        let geometry = feature.geometry.as_ref().ok_or(GraphError::MissingColumn {
            table: "nodes",
            column: "geometry",
            index,
        })?;
        let Value::Point(point) = &geometry.value else {
            return Err(GraphError::InvalidGeometry {
                table: "nodes",
                id,
                reason: "expected a Point".to_string(),
            });
        };
        let at = position(point, "nodes", id)?;
        let mut node = Node::new(id, at.x, at.y);
        node.attributes = pass_through(props, NODE_COLUMNS);
        nodes.push(node);
    }
    Ok(nodes)
}

fn pedestrian_flag(value: Option<&serde_json::Value>) -> bool {
    match value {
        Some(serde_json::Value::Bool(b)) => *b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        _ => false,
    }
}

pub fn edges_from_geojson(text: &str) -> Result<Vec<Edge>, GraphError> {
    let collection = feature_collection(text)?;
    let empty = JsonObject::new();
    let mut edges = Vec::with_capacity(collection.features.len());

    for (index, feature) in collection.features.iter().enumerate() {
        let props = feature.properties.as_ref().unwrap_or(&empty);
        let id = required_id(props, "edges", "edgeID", index)?;
        let u = required_id(props, "edges", "u", index)?;
        let v = required_id(props, "edges", "v", index)?;
        let geometry = feature.geometry.as_ref().ok_or(GraphError::MissingColumn {
            table: "edges",
            column: "geometry",
            index,
        })?;
        let Value::LineString(points) = &geometry.value else {
            return Err(GraphError::InvalidGeometry {
                table: "edges",
                id,
                reason: "expected a LineString".to_string(),
            });
        };
        let coords = points
            .iter()
            .map(|p| position(p, "edges", id))
            .collect::<Result<Vec<_>, _>>()?;
        let line = LineString::new(coords);

        let mut edge = Edge::new(id, u, v, line);
        if let Some(length) = props.get("length").and_then(|l| l.as_f64()) {
            edge.length = length;
        }
        edge.name = props
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string);
        edge.pedestrian = pedestrian_flag(props.get("pedestrian"));
        edge.attributes = pass_through(props, EDGE_COLUMNS);
        edges.push(edge);
    }
    Ok(edges)
}

/// Build a validated graph from the two tables.
pub fn graph_from_geojson(nodes: &str, edges: &str) -> Result<StreetGraph, GraphError> {
    let mut graph = StreetGraph::new();
    for node in nodes_from_geojson(nodes)? {
        graph.add_node(node)?;
    }
    for edge in edges_from_geojson(edges)? {
        graph.add_edge(edge)?;
    }
    Ok(graph)
}

pub fn load_graph(nodes_path: &Path, edges_path: &Path) -> Result<StreetGraph, GraphError> {
    let nodes = std::fs::read_to_string(nodes_path).map_err(|e| io_err!(nodes_path, e))?;
    let edges = std::fs::read_to_string(edges_path).map_err(|e| io_err!(edges_path, e))?;
    graph_from_geojson(&nodes, &edges)
}

fn feature(geometry: Value, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(Geometry::new(geometry)),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

fn collection(features: Vec<Feature>) -> String {
    GeoJson::from(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
    .to_string()
}

pub fn nodes_to_geojson(graph: &StreetGraph) -> String {
    let features = graph
        .nodes
        .values()
        .map(|node| {
            let mut props = node.attributes.clone();
            props.insert("nodeID".to_string(), json!(node.id));
            props.insert("x".to_string(), json!(node.position.x));
            props.insert("y".to_string(), json!(node.position.y));
            feature(
                Value::Point(vec![node.position.x, node.position.y]),
                props,
            )
        })
        .collect();
    collection(features)
}

pub fn edges_to_geojson(graph: &StreetGraph) -> String {
    let features = graph
        .edges
        .values()
        .map(|edge| {
            let mut props = edge.attributes.clone();
            props.insert("edgeID".to_string(), json!(edge.id));
            props.insert("u".to_string(), json!(edge.u));
            props.insert("v".to_string(), json!(edge.v));
            props.insert("length".to_string(), json!(polyline_length(&edge.geometry)));
            props.insert("name".to_string(), json!(edge.name));
            props.insert("pedestrian".to_string(), json!(u8::from(edge.pedestrian)));
            props.insert("new_geo".to_string(), json!(edge.new_geo));
            feature(Value::from(&edge.geometry), props)
        })
        .collect();
    collection(features)
}

pub fn write_graph(
    graph: &StreetGraph,
    nodes_path: &Path,
    edges_path: &Path,
) -> Result<(), GraphError> {
    std::fs::write(nodes_path, nodes_to_geojson(graph)).map_err(|e| io_err!(nodes_path, e))?;
    std::fs::write(edges_path, edges_to_geojson(graph)).map_err(|e| io_err!(edges_path, e))?;
    Ok(())
}
