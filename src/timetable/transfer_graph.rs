use crate::timetable::VertexId;
use crate::time::Time;

/// A directed walking graph over the network's vertices, stored in
/// compressed adjacency form. Edges at each vertex are sorted by head vertex
/// id. Travel times are strictly positive.
#[derive(Debug, Clone)]
pub struct TransferGraph {
    num_vertices: usize,
    first_out: Vec<usize>,
    head: Vec<VertexId>,
    travel_time: Vec<Time>,
}

#[derive(Debug, Clone, Copy)]
pub struct TransferEdge {
    pub to: VertexId,
    pub travel_time: Time,
}

#[derive(Debug, Clone)]
pub enum TransferGraphError {
    VertexOutOfBounds {
        edge_index: usize,
        vertex: usize,
        num_vertices: usize,
    },
    NonPositiveTravelTime {
        edge_index: usize,
        travel_time: Time,
    },
}

impl std::fmt::Display for TransferGraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use TransferGraphError::*;
        match self {
            VertexOutOfBounds {
                edge_index,
                vertex,
                num_vertices,
            } => write!(
                f,
                "Edge {} references vertex {} but the graph has only {} vertices",
                edge_index, vertex, num_vertices
            ),
            NonPositiveTravelTime {
                edge_index,
                travel_time,
            } => write!(
                f,
                "Edge {} has non-positive travel time {}",
                edge_index, travel_time
            ),
        }
    }
}

impl std::error::Error for TransferGraphError {}

impl TransferGraph {
    /// Builds the graph from an unsorted edge list `(tail, head, travel_time)`.
    pub fn new(
        num_vertices: usize,
        edges: &[(VertexId, VertexId, Time)],
    ) -> Result<Self, TransferGraphError> {
        for (edge_index, &(tail, head, travel_time)) in edges.iter().enumerate() {
            for vertex in [tail, head] {
                if vertex.idx() >= num_vertices {
                    return Err(TransferGraphError::VertexOutOfBounds {
                        edge_index,
                        vertex: vertex.idx(),
                        num_vertices,
                    });
                }
            }
            if travel_time <= 0 {
                return Err(TransferGraphError::NonPositiveTravelTime {
                    edge_index,
                    travel_time,
                });
            }
        }

        let mut sorted: Vec<(VertexId, VertexId, Time)> = edges.to_vec();
        sorted.sort_by_key(|&(tail, head, _)| (tail.idx(), head.idx()));

        let mut first_out = Vec::with_capacity(num_vertices + 1);
        let mut head = Vec::with_capacity(sorted.len());
        let mut travel_time = Vec::with_capacity(sorted.len());
        let mut edge_index = 0;
        for vertex in 0..num_vertices {
            first_out.push(edge_index);
            while edge_index < sorted.len() && sorted[edge_index].0.idx() == vertex {
                head.push(sorted[edge_index].1);
                travel_time.push(sorted[edge_index].2);
                edge_index += 1;
            }
        }
        first_out.push(edge_index);

        Ok(Self {
            num_vertices,
            first_out,
            head,
            travel_time,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_edges(&self) -> usize {
        self.head.len()
    }

    pub fn edges_from(&self, vertex: VertexId) -> impl Iterator<Item = TransferEdge> + '_ {
        let begin = self.first_out[vertex.idx()];
        let end = self.first_out[vertex.idx() + 1];
        (begin..end).map(move |e| TransferEdge {
            to: self.head[e],
            travel_time: self.travel_time[e],
        })
    }

    /// Materializes the graph with every edge flipped, for
    /// destination-rooted queries.
    pub fn reverse(&self) -> TransferGraph {
        let mut edges = Vec::with_capacity(self.num_edges());
        for vertex in 0..self.num_vertices {
            let tail = VertexId::new(vertex);
            for edge in self.edges_from(tail) {
                edges.push((edge.to, tail, edge.travel_time));
            }
        }
        TransferGraph::new(self.num_vertices, &edges)
            .expect("reversing cannot introduce invalid edges")
    }
}
