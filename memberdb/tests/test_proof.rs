use memberdb::{
    merkletree::{
        check,
        proof::{self, bytes_to_proof_path, Position, ProofNode, ProofPath},
        Tree,
    },
    utils::hasher::{self, Hash32, ZERO_HASH32},
    RegistryError,
};

fn leaves(n: u32) -> Vec<Hash32> {
    (0..n).map(|i| hasher::hash(i.to_le_bytes())).collect()
}

#[test]
fn test_proofs_across_sizes() {
    for n in [1u32, 2, 3, 5, 7, 8, 9, 31, 64, 100] {
        let tree = Tree::build(leaves(n));
        check::check_hash_consistency(&tree);
        let root = tree.root();
        for leaf in leaves(n) {
            let path = proof::prove_inclusion(&tree, &leaf).unwrap();
            assert!(proof::verify(&leaf, &path, &root), "n={}", n);

            let decoded = bytes_to_proof_path(&path.to_bytes().unwrap()).unwrap();
            assert_eq!(decoded, path);
        }
    }
}

#[test]
fn test_tampered_proofs_fail() {
    let tree = Tree::build(leaves(10));
    let root = tree.root();
    let leaf = leaves(10)[4];
    let path = proof::prove_inclusion(&tree, &leaf).unwrap();

    for i in 0..path.len() {
        let mut bad = path.clone();
        bad.nodes[i].sibling[0] ^= 1;
        assert!(!proof::verify(&leaf, &bad, &root));
    }

    let mut truncated = path.clone();
    truncated.nodes.pop();
    assert!(!proof::verify(&leaf, &truncated, &root));

    let mut extended = path.clone();
    extended.nodes.push(ProofNode {
        sibling: [7; 32],
        position: Position::Left,
    });
    assert!(!proof::verify(&leaf, &extended, &root));

    let mut other_root = root;
    other_root[31] ^= 0x80;
    assert!(!proof::verify(&leaf, &path, &other_root));
}

#[test]
fn test_positions_do_not_affect_verification() {
    let tree = Tree::build(leaves(6));
    let leaf = leaves(6)[0];
    let mut path = proof::prove_inclusion(&tree, &leaf).unwrap();
    for node in path.nodes.iter_mut() {
        node.position = match node.position {
            Position::Left => Position::Right,
            Position::Right => Position::Left,
        };
    }
    assert!(proof::verify(&leaf, &path, &tree.root()));
}

#[test]
fn test_sentinel_root_never_verifies() {
    let empty = ProofPath::default();
    assert!(!proof::verify(&[1; 32], &empty, &ZERO_HASH32));
    assert!(!proof::verify(&ZERO_HASH32, &empty, &ZERO_HASH32));
    assert_eq!(Tree::default().root(), ZERO_HASH32);
}

#[test]
fn test_proof_bytes_rejects_garbage() {
    let cases: Vec<Vec<u8>> = vec![
        vec![],
        vec![1],
        vec![1; 1 + 33 + 1],
        {
            let mut bz = vec![1u8, 7];
            bz.extend_from_slice(&[0; 32]);
            bz
        },
        vec![200],
    ];
    for bz in cases {
        match bytes_to_proof_path(&bz) {
            Err(RegistryError::InvalidFormat(_)) => {}
            other => panic!("unexpected {:?} for {:?}", other, bz),
        }
    }
}

#[test]
fn test_single_leaf_tree() {
    let leaf = [0x42; 32];
    let tree = Tree::build(vec![leaf]);
    assert_eq!(tree.root(), leaf);
    let path = proof::prove_inclusion(&tree, &leaf).unwrap();
    assert!(path.is_empty());
    assert!(proof::verify(&leaf, &path, &leaf));
}
