//! End-to-end collision scenarios with hand-computed expected results.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};

use collision_core::narrow::{
    box_box_manifold, collide, sphere_sphere_distance, BoxBoxFeature,
};
use collision_core::{
    Aabb, BvSplitter, BvhTree, CollisionRequest, MeshMeshCandidates, MeshMeshContinuous, Shape,
    SphereMeshCollision, SplitMethod, Transform3d, Triangle, TriangleMeshData,
};

fn translation(x: f64, y: f64, z: f64) -> Transform3d {
    Transform3d::from_translation(Vector3::new(x, y, z))
}

/// Unit square in the z = 0 plane, split along the x = y diagonal.
fn square_mesh() -> TriangleMeshData {
    let vertices = vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 1.0, 0.0),
        Point3::new(0.0, 1.0, 0.0),
    ];
    let triangles = vec![Triangle::new(0, 1, 2), Triangle::new(0, 2, 3)];
    TriangleMeshData::new(vertices, triangles).unwrap()
}

#[test]
fn test_unit_spheres_overlap() {
    let sphere = Shape::sphere(1.0);
    let tf1 = Transform3d::identity();
    let tf2 = translation(1.5, 0.0, 0.0);

    let contact = collide(&sphere, &tf1, &sphere, &tf2).unwrap().unwrap();
    assert_relative_eq!(contact.depth, 0.5, epsilon = 1e-12);
    assert_relative_eq!(contact.normal, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-12);
    // Midpoint of the overlap interval [0.5, 1.0] along the centre line.
    assert_relative_eq!(contact.point, Point3::new(0.75, 0.0, 0.0), epsilon = 1e-12);

    // Swapping the arguments flips the normal and keeps everything else.
    let swapped = collide(&sphere, &tf2, &sphere, &tf1).unwrap().unwrap();
    assert_relative_eq!(swapped.depth, contact.depth, epsilon = 1e-12);
    assert_relative_eq!(swapped.normal, -contact.normal, epsilon = 1e-12);
    assert_relative_eq!(swapped.point, contact.point, epsilon = 1e-12);
}

#[test]
fn test_unit_spheres_separated() {
    let sphere = Shape::sphere(1.0);
    let tf1 = Transform3d::identity();
    let tf2 = translation(3.0, 0.0, 0.0);

    assert!(collide(&sphere, &tf1, &sphere, &tf2).unwrap().is_none());
    let d = sphere_sphere_distance(1.0, &tf1, 1.0, &tf2).unwrap();
    assert_relative_eq!(d, 1.0, epsilon = 1e-12);
}

#[test]
fn test_unit_boxes_face_manifold() {
    // Half-extent-1 boxes offset by one unit along x: the x faces overlap
    // over a unit interval, so the manifold is the four corners of the
    // incident face at x = 0 with full depth 1.
    let half = Vector3::new(1.0, 1.0, 1.0);
    let tf1 = Transform3d::identity();
    let tf2 = translation(1.0, 0.0, 0.0);

    let (feature, contacts) = box_box_manifold(&half, &tf1, &half, &tf2, 4).unwrap();
    assert_eq!(feature, BoxBoxFeature::Face1(0));
    assert_eq!(contacts.len(), 4);
    for c in &contacts {
        assert_relative_eq!(c.depth, 1.0, epsilon = 1e-9);
        assert_relative_eq!(c.normal, Vector3::new(1.0, 0.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(c.point.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(c.point.y.abs(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(c.point.z.abs(), 1.0, epsilon = 1e-9);
    }
}

#[test]
fn test_box_box_swap_symmetry() {
    // Crossing edges: the first box is spun about z, the second about y, so
    // their closest features are a pair of non-parallel edges.
    let half = Vector3::new(0.5, 0.5, 0.5);
    let tf1 = Transform3d::from_rotation_z(std::f64::consts::FRAC_PI_4);
    let tf2 = Transform3d {
        rotation: Transform3d::from_rotation_y(std::f64::consts::FRAC_PI_4).rotation,
        translation: Vector3::new(1.37, 0.0, 0.0),
    };
    let b = Shape::box_shape(half);

    let forward = collide(&b, &tf1, &b, &tf2).unwrap().unwrap();
    let reverse = collide(&b, &tf2, &b, &tf1).unwrap().unwrap();

    let expected_depth = std::f64::consts::SQRT_2 - 1.37;
    assert_relative_eq!(forward.depth, expected_depth, epsilon = 1e-9);
    assert_relative_eq!(reverse.depth, forward.depth, epsilon = 1e-9);
    assert_relative_eq!(reverse.normal, -forward.normal, epsilon = 1e-9);
}

#[test]
fn test_repeated_queries_are_bit_identical() {
    let b = Shape::box_shape(Vector3::new(0.5, 0.5, 0.5));
    let tf1 = Transform3d::from_rotation_z(0.3);
    let tf2 = Transform3d {
        rotation: Transform3d::from_rotation_x(0.7).rotation,
        translation: Vector3::new(0.6, 0.1, 0.2),
    };
    let first = collide(&b, &tf1, &b, &tf2).unwrap().unwrap();
    let second = collide(&b, &tf1, &b, &tf2).unwrap().unwrap();
    assert_eq!(first, second);

    let tri = Shape::triangle(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(2.0, 0.0, 0.0),
        Point3::new(0.0, 2.0, 0.0),
    );
    let s = Shape::sphere(0.5);
    let tf_s = translation(0.4, 0.4, 0.3);
    let first = collide(&tri, &Transform3d::identity(), &s, &tf_s)
        .unwrap()
        .unwrap();
    let second = collide(&tri, &Transform3d::identity(), &s, &tf_s)
        .unwrap()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_sphere_above_triangle_centroid() {
    let tri = Shape::triangle(
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(3.0, 0.0, 0.0),
        Point3::new(0.0, 3.0, 0.0),
    );
    let sphere = Shape::sphere(0.5);
    let tf_sphere = translation(1.0, 1.0, 0.4);

    let contact = collide(&tri, &Transform3d::identity(), &sphere, &tf_sphere)
        .unwrap()
        .unwrap();
    // The contact sits at the centre's projection onto the face.
    assert_relative_eq!(contact.point, Point3::new(1.0, 1.0, 0.0), epsilon = 1e-9);
    assert_relative_eq!(contact.normal, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-9);
    assert_relative_eq!(contact.depth, 0.1, epsilon = 1e-9);
}

#[test]
fn test_sphere_mesh_traversal_in_world_frame() {
    let mesh = square_mesh();
    let mut splitter = BvSplitter::new(SplitMethod::Mean);
    let tree: BvhTree<Aabb> = BvhTree::build(&mesh, &mut splitter);

    // Mesh lifted to z = 1; the sphere dips 0.05 into the lower triangle
    // and stays clear of the diagonal, so exactly one triangle is hit.
    let tf_mesh = translation(0.0, 0.0, 1.0);
    let tf_sphere = translation(0.7, 0.2, 1.45);
    let request = CollisionRequest::default().with_statistics(true);
    let query = SphereMeshCollision::new(0.5, &tf_sphere, &mesh, &tree, &tf_mesh, request);
    let (contacts, stats) = query.collide();

    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].triangle, 0);
    let c = &contacts[0].contact;
    assert_relative_eq!(c.point, Point3::new(0.7, 0.2, 1.0), epsilon = 1e-9);
    assert_relative_eq!(c.normal, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-9);
    assert_relative_eq!(c.depth, 0.05, epsilon = 1e-9);
    assert!(stats.num_bv_tests > 0);
    assert!(stats.num_leaf_tests > 0);
}

#[test]
fn test_mesh_mesh_candidate_pairs() {
    let mesh1 = square_mesh();
    let mesh2 = square_mesh();
    let mut splitter = BvSplitter::new(SplitMethod::Mean);
    let tree1: BvhTree<Aabb> = BvhTree::build(&mesh1, &mut splitter);
    let tree2: BvhTree<Aabb> = BvhTree::build(&mesh2, &mut splitter);

    // Overlapping placement: every triangle box overlaps every other.
    let request = CollisionRequest::default().with_max_contacts(16);
    let query = MeshMeshCandidates::new(
        &tree1,
        &Transform3d::identity(),
        &tree2,
        &translation(0.25, 0.25, 0.0),
        request,
    );
    let (pairs, _) = query.collide();
    assert_eq!(pairs.len(), 4);

    // Far apart: the root test already rejects.
    let request = CollisionRequest::default().with_max_contacts(16).with_statistics(true);
    let query = MeshMeshCandidates::new(
        &tree1,
        &Transform3d::identity(),
        &tree2,
        &translation(5.0, 0.0, 0.0),
        request,
    );
    let (pairs, stats) = query.collide();
    assert!(pairs.is_empty());
    assert_eq!(stats.num_bv_tests, 1);
    assert_eq!(stats.num_leaf_tests, 0);
}

#[test]
fn test_continuous_triangles_linear_sweep() {
    // A static floor triangle and a smaller triangle falling straight down
    // from z = 2 to z = -2. The sweep crosses the floor plane exactly
    // halfway through the interval, with every falling vertex landing
    // strictly inside the floor face.
    let floor = TriangleMeshData::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ],
        vec![Triangle::new(0, 1, 2)],
    )
    .unwrap();
    let floor_prev = floor.vertices().to_vec();

    let falling_prev = vec![
        Point3::new(0.5, 0.5, 2.0),
        Point3::new(1.0, 0.5, 2.0),
        Point3::new(0.5, 1.0, 2.0),
    ];
    let falling = TriangleMeshData::new(
        vec![
            Point3::new(0.5, 0.5, -2.0),
            Point3::new(1.0, 0.5, -2.0),
            Point3::new(0.5, 1.0, -2.0),
        ],
        vec![Triangle::new(0, 1, 2)],
    )
    .unwrap();

    let mut splitter = BvSplitter::new(SplitMethod::Mean);
    let tree1 = BvhTree::build_swept(&floor, &floor_prev, &mut splitter).unwrap();
    let tree2 = BvhTree::build_swept(&falling, &falling_prev, &mut splitter).unwrap();

    let request = CollisionRequest::default().with_statistics(true);
    let query = MeshMeshContinuous::new(
        &floor,
        &floor_prev,
        &tree1,
        &falling,
        &falling_prev,
        &tree2,
        request,
    )
    .unwrap();
    let result = query.collide();

    assert_eq!(result.pairs.len(), 1);
    assert_eq!((result.pairs[0].id1, result.pairs[0].id2), (0, 0));
    assert_relative_eq!(result.earliest.unwrap(), 0.5, epsilon = 1e-9);
    assert!(result.stats.num_vf_tests > 0);
}

#[test]
fn test_morton_presorted_build_matches_unsorted() {
    // Reordering a mesh's triangles into Morton order changes leaf layout
    // but must not change what a query reports.
    let mesh = square_mesh();
    let centroids: Vec<Point3<f64>> = (0..mesh.triangles().len())
        .map(|id| {
            let [a, b, c] = mesh.triangle_points(id);
            Point3::from((a.coords + b.coords + c.coords) / 3.0)
        })
        .collect();
    let order = collision_core::morton::morton_order(&centroids);
    let reordered = TriangleMeshData::new(
        mesh.vertices().to_vec(),
        order.iter().map(|&i| mesh.triangles()[i]).collect(),
    )
    .unwrap();

    let mut splitter = BvSplitter::new(SplitMethod::Mean);
    let tree: BvhTree<Aabb> = BvhTree::build(&mesh, &mut splitter);
    let tree_sorted: BvhTree<Aabb> = BvhTree::build(&reordered, &mut splitter);

    let tf_mesh = Transform3d::identity();
    let tf_sphere = translation(0.7, 0.2, 0.45);
    let run = |m: &TriangleMeshData, t: &BvhTree<Aabb>| {
        let query =
            SphereMeshCollision::new(0.5, &tf_sphere, m, t, &tf_mesh, CollisionRequest::default());
        query.collide().0
    };
    let contacts = run(&mesh, &tree);
    let contacts_sorted = run(&reordered, &tree_sorted);

    assert_eq!(contacts.len(), contacts_sorted.len());
    assert_eq!(contacts.len(), 1);
    assert_eq!(contacts[0].contact, contacts_sorted[0].contact);
}

#[test]
fn test_continuous_triangles_no_contact() {
    let floor = TriangleMeshData::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.0, 0.0),
        ],
        vec![Triangle::new(0, 1, 2)],
    )
    .unwrap();
    let floor_prev = floor.vertices().to_vec();

    // Drifts sideways well away from the floor.
    let mover_prev = vec![
        Point3::new(5.0, 0.0, 1.0),
        Point3::new(6.0, 0.0, 1.0),
        Point3::new(5.0, 1.0, 1.0),
    ];
    let mover = TriangleMeshData::new(
        vec![
            Point3::new(7.0, 0.0, 1.0),
            Point3::new(8.0, 0.0, 1.0),
            Point3::new(7.0, 1.0, 1.0),
        ],
        vec![Triangle::new(0, 1, 2)],
    )
    .unwrap();

    let mut splitter = BvSplitter::new(SplitMethod::Mean);
    let tree1 = BvhTree::build_swept(&floor, &floor_prev, &mut splitter).unwrap();
    let tree2 = BvhTree::build_swept(&mover, &mover_prev, &mut splitter).unwrap();

    let query = MeshMeshContinuous::new(
        &floor,
        &floor_prev,
        &tree1,
        &mover,
        &mover_prev,
        &tree2,
        CollisionRequest::default(),
    )
    .unwrap();
    let result = query.collide();
    assert!(result.pairs.is_empty());
    assert!(result.earliest.is_none());
}
