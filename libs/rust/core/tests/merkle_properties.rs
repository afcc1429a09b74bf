use provenance_core::merkle::{self, hash_sorted_pair};
use provenance_core::{keccak256, Digest, MerkleTree};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_leaves(rng: &mut StdRng, n: usize) -> Vec<Digest> {
    (0..n).map(|_| Digest(rng.gen())).collect()
}

fn flip_bit(d: &Digest, bit: usize) -> Digest {
    let mut out = *d;
    out.0[bit / 8] ^= 1 << (bit % 8);
    out
}

#[test]
fn every_proof_verifies_for_small_and_large_trees() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for n in [1usize, 2, 3, 5, 8, 1000] {
        let leaves = random_leaves(&mut rng, n);
        let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();
        for (i, leaf) in leaves.iter().enumerate() {
            let proof = tree.proof(i).unwrap();
            assert!(merkle::verify(&proof, &tree.root(), leaf), "n={n} i={i}");
        }
    }
}

#[test]
fn proof_depth_is_logarithmic() {
    let mut rng = StdRng::seed_from_u64(7);
    let tree = MerkleTree::from_leaves(random_leaves(&mut rng, 1000)).unwrap();
    assert!((0..1000).all(|i| tree.proof(i).unwrap().len() <= 10));
}

#[test]
fn any_single_mutation_is_rejected() {
    let mut rng = StdRng::seed_from_u64(42);
    for n in [2usize, 3, 1000] {
        let leaves = random_leaves(&mut rng, n);
        let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();
        let root = tree.root();
        for _ in 0..20 {
            let i = rng.gen_range(0..n);
            let proof = tree.proof(i).unwrap();
            let bit = rng.gen_range(0..256);

            assert!(!merkle::verify(&proof, &root, &flip_bit(&leaves[i], bit)));
            assert!(!merkle::verify(&proof, &flip_bit(&root, bit), &leaves[i]));
            if !proof.is_empty() {
                let j = rng.gen_range(0..proof.len());
                let mut bad = proof.clone();
                bad[j] = flip_bit(&bad[j], bit);
                assert!(!merkle::verify(&bad, &root, &leaves[i]));
            }
        }
    }
}

#[test]
fn proof_order_of_siblings_matters_but_position_does_not() {
    let leaves: Vec<Digest> = (0..4u64).map(|i| keccak256(&i.to_le_bytes())).collect();
    let tree = MerkleTree::from_leaves(leaves.clone()).unwrap();
    // swapping the two leaves of a pair does not change the root
    let swapped = MerkleTree::from_leaves(vec![leaves[1], leaves[0], leaves[2], leaves[3]]).unwrap();
    assert_eq!(tree.root(), swapped.root());

    let mut proof = tree.proof(0).unwrap();
    proof.reverse();
    assert!(!merkle::verify(&proof, &tree.root(), &leaves[0]));
}

#[test]
fn single_file_dataset_root_is_file_hash() {
    let tree = MerkleTree::from_files([b"only-file".as_slice()]).unwrap();
    assert_eq!(tree.root(), keccak256(b"only-file"));
    assert_eq!(tree.len(), 1);
    assert_eq!(hash_sorted_pair(&tree.root(), &Digest::ZERO), hash_sorted_pair(&Digest::ZERO, &tree.root()));
}
