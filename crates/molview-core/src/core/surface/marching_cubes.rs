use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use nalgebra::Point3;
use tracing::{debug, trace};

use super::Cancelled;
use super::grid::{CUBE_CORNERS, Grid};
use super::tables::{EDGE_TABLE, EDGE_VERTICES, TRI_TABLE};

/// Welded triangle soup produced by [`triangulate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Triangulation {
    pub vertices: Vec<Point3<f64>>,
    pub triangles: Vec<[u32; 3]>,
}

/// Extracts the `iso` level set of the grid.
///
/// Vertices on an edge shared by neighbouring cells are created once. Each
/// triangle is wound counter-clockwise seen from the side where the field is
/// larger than `iso`, so face normals follow the field gradient outward.
pub fn triangulate(grid: &Grid, iso: f64, cancel: &AtomicBool) -> Result<Triangulation, Cancelled> {
    let mut out = Triangulation::default();
    let mut welded: HashMap<usize, u32> = HashMap::new();
    let [cells_x, cells_y, cells_z] = grid.cell_dims();

    for z in 0..cells_z {
        if cancel.load(Ordering::Relaxed) {
            return Err(Cancelled);
        }
        let before = out.triangles.len();
        for y in 0..cells_y {
            for x in 0..cells_x {
                let values = grid.cube_values(x, y, z);
                let mask = corner_mask(&values, iso);
                let crossed = EDGE_TABLE[mask];
                if crossed == 0 {
                    continue;
                }

                let mut edge_vertex = [0u32; 12];
                for (edge, &(a, b)) in EDGE_VERTICES.iter().enumerate() {
                    if crossed & (1 << edge) == 0 {
                        continue;
                    }
                    let key = edge_key(grid, [x, y, z], a, b);
                    edge_vertex[edge] = *welded.entry(key).or_insert_with(|| {
                        out.vertices
                            .push(interpolate(grid, [x, y, z], (a, b), &values, iso));
                        (out.vertices.len() - 1) as u32
                    });
                }

                // Table triangles face their inside corners; reversed they face up the gradient.
                for edges in TRI_TABLE[mask]
                    .chunks_exact(3)
                    .take_while(|edges| edges[0] >= 0)
                {
                    out.triangles.push([
                        edge_vertex[edges[0] as usize],
                        edge_vertex[edges[2] as usize],
                        edge_vertex[edges[1] as usize],
                    ]);
                }
            }
        }
        trace!(slice = z, triangles = out.triangles.len() - before, "Cell slice triangulated");
    }

    debug!(
        vertices = out.vertices.len(),
        triangles = out.triangles.len(),
        "Isosurface extracted"
    );
    Ok(out)
}

/// Bit `i` is set when corner `i` lies inside (below `iso`).
fn corner_mask(values: &[f64; 8], iso: f64) -> usize {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v < iso)
        .fold(0usize, |mask, (i, _)| mask | (1 << i))
}

/// Grid-wide identity of a cell edge: its lower vertex and axis.
fn edge_key(grid: &Grid, cell: [usize; 3], a: usize, b: usize) -> usize {
    let (ca, cb) = (CUBE_CORNERS[a], CUBE_CORNERS[b]);
    let axis = (0..3).find(|&i| ca[i] != cb[i]).unwrap_or(0);
    let lower = [
        cell[0] + ca[0].min(cb[0]),
        cell[1] + ca[1].min(cb[1]),
        cell[2] + ca[2].min(cb[2]),
    ];
    grid.vertex_index(lower[0], lower[1], lower[2]) * 3 + axis
}

fn corner_position(grid: &Grid, cell: [usize; 3], corner: usize) -> Point3<f64> {
    let [dx, dy, dz] = CUBE_CORNERS[corner];
    grid.vertex_position(cell[0] + dx, cell[1] + dy, cell[2] + dz)
}

fn interpolate(
    grid: &Grid,
    cell: [usize; 3],
    (a, b): (usize, usize),
    values: &[f64; 8],
    iso: f64,
) -> Point3<f64> {
    let (pa, pb) = (corner_position(grid, cell, a), corner_position(grid, cell, b));
    let (va, vb) = (values[a], values[b]);
    let t = if (vb - va).abs() > 1e-12 {
        ((iso - va) / (vb - va)).clamp(0.0, 1.0)
    } else {
        0.5
    };
    pa + (pb - pa) * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;
    use std::collections::HashSet;

    fn face_normal(vertices: &[Point3<f64>], [a, b, c]: [u32; 3]) -> Vector3<f64> {
        let (pa, pb, pc) = (
            vertices[a as usize],
            vertices[b as usize],
            vertices[c as usize],
        );
        (pb - pa).cross(&(pc - pa))
    }

    fn grid_from(dims: [usize; 3], field: impl Fn(f64, f64, f64) -> f64) -> Grid {
        let mut grid = Grid {
            origin: Point3::origin(),
            spacing: 1.0,
            dims,
            values: vec![0.0; dims[0] * dims[1] * dims[2]],
        };
        for index in 0..grid.vertex_count() {
            let [x, y, z] = grid.vertex_coords(index);
            let p = grid.vertex_position(x, y, z);
            grid.values[index] = field(p.x, p.y, p.z);
        }
        grid
    }

    fn run(grid: &Grid) -> Triangulation {
        triangulate(grid, 0.0, &AtomicBool::new(false)).unwrap()
    }

    mod tables {
        use super::*;

        #[test]
        fn edge_table_agrees_with_triangle_table() {
            for mask in 0..256 {
                let used = TRI_TABLE[mask]
                    .iter()
                    .take_while(|e| **e >= 0)
                    .fold(0u16, |acc, e| acc | (1u16 << *e));
                assert_eq!(used, EDGE_TABLE[mask], "mask {mask}");
            }
        }

        #[test]
        fn complementary_masks_cross_the_same_edges() {
            for mask in 0..256 {
                assert_eq!(EDGE_TABLE[mask], EDGE_TABLE[255 - mask], "mask {mask}");
            }
        }

        #[test]
        fn rows_hold_whole_triangles() {
            for row in TRI_TABLE.iter() {
                let len = row.iter().take_while(|e| **e >= 0).count();
                assert_eq!(len % 3, 0);
                assert!(len <= 15);
            }
            assert_eq!(TRI_TABLE[0][0], -1);
            assert_eq!(TRI_TABLE[255][0], -1);
        }

        #[test]
        fn table_winding_faces_inside_corners() {
            let corner = |i: usize| {
                let [x, y, z] = CUBE_CORNERS[i];
                Vector3::new(x as f64, y as f64, z as f64)
            };
            let midpoint = |edge: i8| {
                let (a, b) = EDGE_VERTICES[edge as usize];
                Point3::from((corner(a) + corner(b)) / 2.0)
            };
            for mask in 0..256usize {
                for edges in TRI_TABLE[mask].chunks_exact(3).take_while(|e| e[0] >= 0) {
                    let vertices: Vec<_> = edges.iter().map(|e| midpoint(*e)).collect();
                    let normal = face_normal(&vertices, [0, 1, 2]);
                    // Sum of inside-to-outside directions along the triangle's own edges.
                    let outward = edges.iter().fold(Vector3::zeros(), |acc, e| {
                        let (a, b) = EDGE_VERTICES[*e as usize];
                        let (inside, outside) = if mask & (1 << a) != 0 { (a, b) } else { (b, a) };
                        acc + corner(outside) - corner(inside)
                    });
                    assert!(normal.dot(&outward) < 0.0, "mask {mask}");
                }
            }
        }

        #[test]
        fn edges_join_adjacent_corners() {
            for (a, b) in EDGE_VERTICES {
                let differing = (0..3)
                    .filter(|&i| CUBE_CORNERS[a][i] != CUBE_CORNERS[b][i])
                    .count();
                assert_eq!(differing, 1);
            }
        }
    }

    #[test]
    fn uniform_field_produces_nothing() {
        let grid = grid_from([3, 3, 3], |_, _, _| 1.0);
        assert_eq!(run(&grid), Triangulation::default());
    }

    #[test]
    fn plane_is_welded_and_faces_increasing_field() {
        let grid = grid_from([3, 3, 3], |x, _, _| x - 0.3);
        let mesh = run(&grid);
        assert_eq!(mesh.vertices.len(), 9);
        assert_eq!(mesh.triangles.len(), 8);
        for vertex in &mesh.vertices {
            assert!((vertex.x - 0.3).abs() < 1e-12);
        }
        for triangle in &mesh.triangles {
            assert!(face_normal(&mesh.vertices, *triangle).x > 0.0);
        }
    }

    #[test]
    fn single_inside_vertex_gives_closed_octahedron() {
        let grid = grid_from([3, 3, 3], |x, y, z| {
            if (x, y, z) == (1.0, 1.0, 1.0) { -1.0 } else { 1.0 }
        });
        let mesh = run(&grid);
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.triangles.len(), 8);

        let centre = Point3::new(1.0, 1.0, 1.0);
        for vertex in &mesh.vertices {
            assert!(((vertex - centre).norm() - 0.5).abs() < 1e-12);
        }

        // Closed and consistently wound: every directed edge appears once and
        // its reverse appears once.
        let mut directed = HashSet::new();
        for [a, b, c] in &mesh.triangles {
            for edge in [(*a, *b), (*b, *c), (*c, *a)] {
                assert!(directed.insert(edge), "duplicate directed edge {edge:?}");
            }
        }
        for (a, b) in &directed {
            assert!(directed.contains(&(*b, *a)));
        }

        for triangle in &mesh.triangles {
            let [a, b, c] = triangle.map(|i| mesh.vertices[i as usize]);
            let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
            assert!(face_normal(&mesh.vertices, *triangle).dot(&(centroid - centre)) > 0.0);
        }
    }

    #[test]
    fn cancellation_stops_before_first_slice() {
        let grid = grid_from([3, 3, 3], |x, _, _| x - 0.3);
        assert_eq!(
            triangulate(&grid, 0.0, &AtomicBool::new(true)),
            Err(Cancelled)
        );
    }
}
