use ethers::prelude::abigen;

abigen!(
    INftxVaultFactory,
    r#"[
        function vault(uint256 vaultId) external view returns (address)
    ]"#
);
